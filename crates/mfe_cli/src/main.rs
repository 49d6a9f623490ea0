use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use mfe_core::core_api::{CoreError, CoreErrorCode, Engine, Session};
use mfe_core::record::Field;
use mfe_core::{SaveMode, SaveOptions, SaveReport};
use mfe_render::{
    TextRenderOptions, render_detail_with_options, render_json, render_json_many,
    render_list_with_options, sanitize_ascii,
};
use serde_json::Value as JsonValue;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "mfe=warn,mfe_core=warn";
const VERBOSE_LOG_FILTER: &str = "mfe=info,mfe_core=info";

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(value_name = "MONSTER.TXT", env = "MFE_MONSTER_FILE")]
    path: PathBuf,
    #[arg(long, value_name = "TERM", conflicts_with = "show")]
    search: Option<String>,
    #[arg(long, value_name = "NAME")]
    show: Option<String>,
    #[arg(long)]
    json: bool,
    #[arg(long)]
    ascii: bool,
    #[arg(short, long)]
    verbose: bool,
    #[arg(long, value_name = "NAME")]
    monster: Option<String>,
    #[arg(long = "set-speed", allow_hyphen_values = true)]
    set_speed: Option<i64>,
    #[arg(long = "set-hp", allow_hyphen_values = true)]
    set_hp: Option<i64>,
    #[arg(long = "set-experience", allow_hyphen_values = true)]
    set_experience: Option<i64>,
    #[arg(long = "set-spell-power", allow_hyphen_values = true)]
    set_spell_power: Option<i64>,
    #[arg(long = "set-rarity", allow_hyphen_values = true)]
    set_rarity: Option<i64>,
    #[arg(long = "set-desc", value_name = "TEXT")]
    set_desc: Option<String>,
    #[arg(long = "set-flags-off", value_name = "TEXT")]
    set_flags_off: Option<String>,
    #[arg(long = "add-blow", value_name = "BLOW")]
    add_blow: Vec<String>,
    #[arg(long = "add-flag", value_name = "FLAGS")]
    add_flag: Vec<String>,
    #[arg(long = "backup-prefix", value_name = "PREFIX")]
    backup_prefix: Option<String>,
    #[arg(long)]
    derivative: bool,
}

impl Cli {
    /// Requested edits in the order they are applied.
    fn edits(&self) -> Vec<Edit> {
        let mut out = Vec::new();
        let ints = [
            (Field::Speed, self.set_speed),
            (Field::Health, self.set_hp),
            (Field::Experience, self.set_experience),
            (Field::SpellPower, self.set_spell_power),
            (Field::Rarity, self.set_rarity),
        ];
        for (field, value) in ints {
            if let Some(v) = value {
                out.push(Edit::Set(field, v.to_string()));
            }
        }
        if let Some(text) = &self.set_desc {
            out.push(Edit::Set(Field::Description, text.clone()));
        }
        if let Some(text) = &self.set_flags_off {
            out.push(Edit::Set(Field::FlagsOff, text.clone()));
        }
        for blow in &self.add_blow {
            out.push(Edit::Append(Field::Blow, blow.clone()));
        }
        for flags in &self.add_flag {
            out.push(Edit::Append(Field::Flags, flags.clone()));
        }
        out
    }

    fn save_options(&self) -> SaveOptions {
        let mut options = SaveOptions::default();
        if let Some(prefix) = &self.backup_prefix {
            options.backup_prefix.clone_from(prefix);
        }
        if self.derivative {
            options.mode = SaveMode::Derivative;
        }
        options
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Edit {
    Set(Field, String),
    Append(Field, String),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let edits = cli.edits();
    let has_edits = !edits.is_empty();
    if has_edits && cli.monster.is_none() {
        eprintln!("--set-* and --add-* flags require --monster <NAME>");
        process::exit(2);
    }
    if !has_edits && cli.monster.is_some() {
        eprintln!("--monster requires at least one --set-* or --add-* flag");
        process::exit(2);
    }
    if !has_edits && (cli.backup_prefix.is_some() || cli.derivative) {
        eprintln!("--backup-prefix and --derivative only apply when editing");
        process::exit(2);
    }

    let text_options = TextRenderOptions {
        ascii_only: cli.ascii,
    };
    let mut session = Engine::new()
        .open_with_options(&cli.path, cli.save_options())
        .unwrap_or_else(|e| fail(&format!("Error loading {}", cli.path.display()), e));

    if let Some(name) = &cli.monster {
        for edit in &edits {
            apply_edit(&mut session, name, edit)
                .unwrap_or_else(|e| fail("Error applying edit", e));
        }
        let saved_name = session
            .working_copy(name)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| name.clone());
        let report = session
            .save_all()
            .unwrap_or_else(|e| fail("Error saving changes", e));
        if report.missing.iter().any(|m| m == name) {
            fail("Error saving changes", CoreError::not_found(name));
        }
        info!(record = %saved_name, written = %report.written.display(), "saved edit");

        if cli.json {
            match session.record(&saved_name) {
                Some(monster) => print_json(&render_json(monster), cli.ascii),
                None => fail("Error saving changes", CoreError::not_found(&saved_name)),
            }
        } else {
            print_report(&report, cli.ascii);
        }
        return;
    }

    if let Some(name) = &cli.show {
        let monster = session
            .record(name)
            .unwrap_or_else(|| fail("Error", CoreError::not_found(name)));
        if cli.json {
            print_json(&render_json(monster), cli.ascii);
        } else {
            print!("{}", render_detail_with_options(monster, text_options));
        }
        return;
    }

    let records = match &cli.search {
        Some(term) => session.search(term),
        None => session.records().iter().collect(),
    };
    if cli.json {
        print_json(&render_json_many(&records), cli.ascii);
    } else {
        print!("{}", render_list_with_options(&records, text_options));
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

fn apply_edit(session: &mut Session, name: &str, edit: &Edit) -> Result<(), CoreError> {
    match edit {
        Edit::Set(field, raw) => session.set_field(name, *field, raw),
        Edit::Append(field, raw) => session.append_field(name, *field, raw),
    }
}

fn print_report(report: &SaveReport, ascii: bool) {
    let mut out = String::new();
    if let Some(backup) = &report.backup {
        out.push_str(&format!("Backup written to {}\n", backup.display()));
    }
    out.push_str(&format!("Saved changes to {}\n", report.written.display()));
    emit(out, ascii);
}

fn print_json(value: &JsonValue, ascii: bool) {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error rendering JSON output: {e}");
        process::exit(1);
    });
    emit(format!("{rendered}\n"), ascii);
}

fn emit(text: String, ascii: bool) {
    if ascii {
        print!("{}", sanitize_ascii(&text));
    } else {
        print!("{text}");
    }
}

fn exit_code(code: CoreErrorCode) -> i32 {
    match code {
        CoreErrorCode::Io => 1,
        CoreErrorCode::Validation => 2,
        CoreErrorCode::NotFound => 3,
        CoreErrorCode::Parse => 4,
        CoreErrorCode::Backup => 5,
        CoreErrorCode::Write => 6,
    }
}

fn fail(context: &str, err: CoreError) -> ! {
    eprintln!("{context}: {}", err.message);
    process::exit(exit_code(err.code));
}
