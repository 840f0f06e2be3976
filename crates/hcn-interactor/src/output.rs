//! Output formatting for CLI results
//!
//! Three formats are supported:
//! - Table: human-readable tables (default)
//! - JSON: one `JsonResponse` envelope per command, for scripting
//! - Quiet: no output, exit codes only

use std::str::FromStr;

use comfy_table::{presets::UTF8_FULL, Table};
use hcn_core::{AssignmentOutcome, AssignmentReport, CredentialRecord, ShareProposal};
use hcn_crypto::Account;
use serde::Serialize;

use crate::config::Config;
use crate::ExitCode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Quiet,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Quiet => write!(f, "quiet"),
        }
    }
}

/// Standard JSON response wrapper
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub exit_code: i32,
    pub exit_code_name: &'static str,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn new(data: T, command: &str, code: ExitCode) -> Self {
        Self {
            success: code == ExitCode::Success,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: Some(command.to_string()),
            exit_code: code.into(),
            exit_code_name: code.name(),
        }
    }
}

impl JsonResponse<()> {
    pub fn error(message: &str, command: &str, code: ExitCode) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: Some(command.to_string()),
            exit_code: code.into(),
            exit_code_name: code.name(),
        }
    }
}

/// JSON shape of an assignment report.
#[derive(Debug, Serialize)]
pub struct AssignmentOutput {
    pub credential: String,
    pub node_url: String,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub attempts: u32,
    pub states: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_record: Option<CredentialRecord>,
}

impl From<&AssignmentReport> for AssignmentOutput {
    fn from(r: &AssignmentReport) -> Self {
        let mut out = Self {
            credential: r.credential.clone(),
            node_url: r.node_url.clone(),
            network: r.network.to_string(),
            signer: r.signer.map(|a| a.to_checksum()),
            node_id: r.node_id.clone(),
            state: r.state().to_string(),
            reference: None,
            pending: None,
            reason: None,
            failure: None,
            hint: None,
            attempts: r.attempts,
            states: r.states.iter().map(|s| s.to_string()).collect(),
            credential_record: r.record.clone(),
        };
        match &r.outcome {
            AssignmentOutcome::Confirmed(c) => {
                out.reference = Some(c.reference.clone());
                out.pending = Some(c.pending);
            }
            AssignmentOutcome::Rejected(reason) => out.reason = Some(reason.to_string()),
            AssignmentOutcome::Failed(err) => {
                out.failure = Some(err.kind().to_string());
                out.reason = Some(err.to_string());
                out.hint = Some(err.hint().to_string());
            }
        }
        out
    }
}

#[derive(Debug, Serialize)]
pub struct AccountOutput {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct LookupOutput {
    pub credential: String,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<CredentialRecord>,
}

#[derive(Debug, Serialize)]
pub struct SharesOutput {
    pub operator: String,
    pub network: String,
    pub proposals: Vec<ShareProposal>,
}

pub struct OutputFormatter {
    format: OutputFormat,
    verbose: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_quiet(&self) -> bool {
        self.format == OutputFormat::Quiet
    }

    pub fn format_report(&self, report: &AssignmentReport, code: ExitCode) -> String {
        match self.format {
            OutputFormat::Table => self.report_table(report),
            OutputFormat::Json => {
                self.to_json(&JsonResponse::new(AssignmentOutput::from(report), "assign", code))
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_lookup(&self, output: &LookupOutput, code: ExitCode) -> String {
        match self.format {
            OutputFormat::Table => match &output.record {
                Some(record) => record_table(record),
                None => format!(
                    "Credential {} not found on {}.",
                    output.credential, output.network
                ),
            },
            OutputFormat::Json => self.to_json(&JsonResponse::new(output, "lookup", code)),
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_shares(&self, output: &SharesOutput) -> String {
        match self.format {
            OutputFormat::Table if output.proposals.is_empty() => format!(
                "No share proposals for {} on {}.",
                output.operator, output.network
            ),
            OutputFormat::Table => {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec![
                    "Chain", "Proposal", "Share", "CHYPC", "License", "rToken", "wToken",
                ]);
                for p in &output.proposals {
                    table.add_row(vec![
                        &p.chain,
                        &p.proposal_id,
                        &p.share_number_id,
                        &p.chypc_id,
                        &p.license_id,
                        &p.r_token_id,
                        &p.w_token_id,
                    ]);
                }
                table.to_string()
            }
            OutputFormat::Json => {
                self.to_json(&JsonResponse::new(output, "lookup", ExitCode::Success))
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_account(&self, account: &Account) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Property", "Value"]);
                table.add_row(vec!["Address", &account.to_checksum()]);
                table.to_string()
            }
            OutputFormat::Json => self.to_json(&JsonResponse::new(
                AccountOutput {
                    address: account.to_checksum(),
                },
                "account",
                ExitCode::Success,
            )),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Effective configuration, as TOML in table mode.
    pub fn format_config(&self, config: &Config) -> String {
        match self.format {
            OutputFormat::Table => toml::to_string_pretty(config)
                .unwrap_or_else(|e| format!("# failed to render configuration: {e}")),
            OutputFormat::Json => {
                self.to_json(&JsonResponse::new(config, "config show", ExitCode::Success))
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    pub fn format_error(&self, message: &str, command: &str, code: ExitCode) -> String {
        match self.format {
            OutputFormat::Table => format!("Error: {message}"),
            OutputFormat::Json => self.to_json(&JsonResponse::error(message, command, code)),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Progress message, shown in verbose table mode only
    pub fn progress(&self, message: &str) {
        if self.verbose && self.format == OutputFormat::Table {
            eprintln!("... {message}");
        }
    }

    pub fn success(&self, message: &str) {
        if self.format == OutputFormat::Table {
            println!("✓ {message}");
        }
    }

    pub fn warning(&self, message: &str) {
        if self.format == OutputFormat::Table {
            eprintln!("⚠ {message}");
        }
    }

    /// Print a formatted block unless it is empty.
    pub fn emit(&self, text: &str) {
        if !text.is_empty() {
            println!("{text}");
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    fn report_table(&self, report: &AssignmentReport) -> String {
        let out = AssignmentOutput::from(report);
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Property", "Value"]);
        table.add_row(vec!["Credential", &out.credential]);
        table.add_row(vec!["Node", &out.node_url]);
        table.add_row(vec!["Network", &out.network]);
        table.add_row(vec!["Signer", out.signer.as_deref().unwrap_or("-")]);
        if let Some(node_id) = &out.node_id {
            table.add_row(vec!["Node ID", node_id]);
        }
        table.add_row(vec!["State", &out.state]);
        if let Some(reference) = &out.reference {
            table.add_row(vec!["Reference", reference]);
        }
        if out.pending == Some(true) {
            table.add_row(vec!["Settled", "no (node still processing)"]);
        }
        if let Some(reason) = &out.reason {
            table.add_row(vec!["Reason", reason]);
        }
        if let Some(hint) = &out.hint {
            table.add_row(vec!["Next step", hint]);
        }
        table.add_row(vec!["Attempts", &out.attempts.to_string()]);
        if self.verbose {
            table.add_row(vec!["States", &out.states.join(" -> ")]);
        }
        table.to_string()
    }
}

fn record_table(record: &CredentialRecord) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Property", "Value"]);
    table.add_row(vec!["Type", &record.kind.to_string()]);
    table.add_row(vec!["Chain", &record.chain]);
    table.add_row(vec!["Owner", &record.owner]);
    table.add_row(vec![
        "Delegated Signer",
        record.delegated_signer.as_deref().unwrap_or("-"),
    ]);
    table.add_row(vec![
        "Required Backing",
        if record.has_required_backing { "yes" } else { "no" },
    ]);
    let tokens = if record.backing_tokens.is_empty() {
        "-".to_string()
    } else {
        record.backing_tokens.join(", ")
    };
    table.add_row(vec!["Backing Tokens", &tokens]);
    table.to_string()
}
