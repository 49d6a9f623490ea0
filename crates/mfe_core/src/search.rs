use crate::record::Monster;

/// Records whose name contains `term`, ignoring case, in input order.
///
/// An empty term matches everything.
pub fn search<'a>(records: &'a [Monster], term: &str) -> Vec<&'a Monster> {
    let needle = term.to_lowercase();
    records
        .iter()
        .filter(|m| m.name.to_lowercase().contains(&needle))
        .collect()
}
