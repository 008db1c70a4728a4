use crate::invocation::{self, DetailLevel, RunMode, TechniqueInvocation};
use crate::runner::TechniqueRunner;
use colored::*;
use log::{info, warn};
use serde::Serialize;

/// One test inside a playbook
#[derive(Debug, Clone, Copy)]
pub struct PlaybookTest {
    pub technique_id: &'static str,
    /// Specific test numbers to run; None means all tests for the technique
    pub test_numbers: Option<&'static [u32]>,
    pub description: &'static str,
}

/// A named, ordered batch of technique invocations run together as one
/// scenario. The catalog is fixed at compile time and never mutated.
#[derive(Debug, Clone, Copy)]
pub struct Playbook {
    pub name: &'static str,
    pub description: &'static str,
    pub tests: &'static [PlaybookTest],
    pub guidance: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybookTestResult {
    pub technique_id: String,
    pub description: String,
    pub success: bool,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybookRunResult {
    pub overall_success: bool,
    pub results: Vec<PlaybookTestResult>,
}

const CREDENTIAL_ACCESS_GUIDANCE: &str = r#"# Defender Guidance - Credential Access Playbook

## Log Sources to Monitor
- Windows Event Log (Security): 4663, 4656, 4624, 4625
- Sysmon: Process creation (Event ID 1), File creation (Event ID 11)
- PowerShell Script Block Logging (Event ID 4104)
- Process and command line auditing

## Key Detection Opportunities
- Monitor for processes accessing credential files (mimikatz, procdump)
- Look for suspicious process creation events creating lsass.exe dumps
- Monitor registry operations related to credential storage
- Watch for unexpected DPAPI usage
- Monitor access to browser data files and directories
- Detect suspicious command-line parameters for built-in utilities like reg.exe

## Basic Response Steps
1. Isolate the affected endpoint immediately
2. Investigate the authentication events following the credential access
3. Force password resets for any potentially compromised accounts
4. Look for persistence mechanisms that may have been established
5. Check for lateral movement using potentially stolen credentials
"#;

const DISCOVERY_GUIDANCE: &str = r#"# Defender Guidance - Discovery Playbook

## Log Sources to Monitor
- Windows Event Log (Security and System)
- PowerShell Module Logging (Event ID 4103)
- Command-line process auditing (Event ID 4688 with command line)
- Sysmon Process Creation (Event ID 1)
- Network connection logs and NetFlow/zeek data

## Key Detection Opportunities
- Multiple discovery commands executed in short succession
- Use of built-in Windows utilities for system enumeration (net.exe, ipconfig, systeminfo)
- PowerShell cmdlets for system and network discovery
- Host enumeration via Active Directory queries
- Suspicious registry queries related to system configuration

## Basic Response Steps
1. Evaluate context - is this activity expected from the user/system?
2. Look for other suspicious activities that might follow reconnaissance
3. Correlate discovery activities with other potential attack indicators
4. If malicious, investigate how the attacker gained initial access
5. Monitor for subsequent lateral movement or privilege escalation attempts
"#;

const PERSISTENCE_GUIDANCE: &str = r#"# Defender Guidance - Persistence Playbook

## Log Sources to Monitor
- Windows Event Log (Security): 4624, 4720, 4732
- System Event Log: 106, 4698, 4699, 4700, 4701 (Task Scheduler)
- Sysmon: Registry modifications (Event ID 12 & 13)
- Process Creation (Event ID 4688 with command line or Sysmon Event ID 1)
- PowerShell logs if used for persistence implementation

## Key Detection Opportunities
- New scheduled tasks created with odd names or suspicious command lines
- Registry modifications to Run/RunOnce keys
- New user account creation outside normal provisioning processes
- Unusual service installations or modifications
- New startup folder items

## Basic Response Steps
1. Identify and analyze the persistence mechanism
2. Identify how it was established (credential access? privileged account?)
3. Verify what commands or payloads execute when the persistence triggers
4. Remove the persistence mechanism after proper investigation
5. Hunt for additional persistence mechanisms (adversaries rarely use just one)
6. Reset credentials for any accounts that were potentially compromised
7. Analyze any payloads/binaries used by the persistence mechanism
"#;

/// The fixed playbook catalog, keyed by lowercase name
pub const PLAYBOOKS: &[Playbook] = &[
    Playbook {
        name: "credential-access",
        description: "Basic credential access and dumping playbook simulating an attacker attempting to harvest credentials",
        tests: &[
            PlaybookTest {
                technique_id: "T1003",
                test_numbers: Some(&[1]),
                description: "OS Credential Dumping - Dumps cached credentials",
            },
            PlaybookTest {
                technique_id: "T1552.001",
                test_numbers: Some(&[1]),
                description: "Credentials In Files - Access credential files",
            },
            PlaybookTest {
                technique_id: "T1555.003",
                test_numbers: Some(&[1]),
                description: "Credentials from Web Browsers - Extract credentials from browser stores",
            },
        ],
        guidance: CREDENTIAL_ACCESS_GUIDANCE,
    },
    Playbook {
        name: "discovery",
        description: "Host and network discovery playbook simulating an attacker's reconnaissance phase",
        tests: &[
            PlaybookTest {
                technique_id: "T1087.001",
                test_numbers: Some(&[1]),
                description: "Account Discovery - Local Accounts",
            },
            PlaybookTest {
                technique_id: "T1016",
                test_numbers: Some(&[1]),
                description: "System Network Configuration Discovery",
            },
            PlaybookTest {
                technique_id: "T1018",
                test_numbers: None,
                description: "Remote System Discovery",
            },
            PlaybookTest {
                technique_id: "T1082",
                test_numbers: None,
                description: "System Information Discovery",
            },
        ],
        guidance: DISCOVERY_GUIDANCE,
    },
    Playbook {
        name: "persistence",
        description: "Persistence mechanism playbook simulating an attacker establishing staying power in the environment",
        tests: &[
            PlaybookTest {
                technique_id: "T1547.001",
                test_numbers: None,
                description: "Boot or Logon Autostart Execution - Registry Run Keys",
            },
            PlaybookTest {
                technique_id: "T1053.005",
                test_numbers: None,
                description: "Scheduled Task/Job: Scheduled Task",
            },
            PlaybookTest {
                technique_id: "T1136.001",
                test_numbers: None,
                description: "Create Account: Local Account",
            },
        ],
        guidance: PERSISTENCE_GUIDANCE,
    },
];

/// Look up a playbook by case-insensitive name
pub fn get_playbook(name: &str) -> Option<&'static Playbook> {
    let wanted = name.to_lowercase();
    PLAYBOOKS.iter().find(|playbook| playbook.name == wanted)
}

/// Catalog sanity, checked once at process start and exercised in tests:
/// unique lowercase names, no empty playbooks, well-formed technique IDs,
/// no empty or zero test-number lists
pub fn catalog_is_valid() -> bool {
    if PLAYBOOKS.is_empty() {
        return false;
    }
    for (position, playbook) in PLAYBOOKS.iter().enumerate() {
        if playbook.name != playbook.name.to_lowercase() {
            return false;
        }
        if PLAYBOOKS[..position]
            .iter()
            .any(|earlier| earlier.name == playbook.name)
        {
            return false;
        }
        if playbook.tests.is_empty() {
            return false;
        }
        for test in playbook.tests {
            if !invocation::validate_technique_id(test.technique_id) {
                return false;
            }
            if let Some(numbers) = test.test_numbers {
                if numbers.is_empty() || numbers.contains(&0) {
                    return false;
                }
            }
        }
    }
    true
}

/// Run every test in the named playbook, in declared order, with the same
/// mode and session for each. A failing test never stops the batch.
pub async fn execute_playbook(
    runner: &TechniqueRunner,
    playbook_name: &str,
    mode: RunMode,
    session: Option<&str>,
) -> PlaybookRunResult {
    match get_playbook(playbook_name) {
        Some(playbook) => run_playbook_tests(runner, playbook, mode, session).await,
        None => {
            warn!("Playbook '{playbook_name}' not found");
            PlaybookRunResult {
                overall_success: false,
                results: vec![PlaybookTestResult {
                    technique_id: String::new(),
                    description: format!("Playbook '{playbook_name}' not found"),
                    success: false,
                    output: String::new(),
                }],
            }
        }
    }
}

pub async fn run_playbook_tests(
    runner: &TechniqueRunner,
    playbook: &Playbook,
    mode: RunMode,
    session: Option<&str>,
) -> PlaybookRunResult {
    let mut overall_success = true;
    let mut results = Vec::with_capacity(playbook.tests.len());

    for test in playbook.tests {
        println!(
            "\n{} {}",
            "Executing:".bold(),
            format!("{} - {}", test.technique_id.yellow(), test.description).bold()
        );
        info!("Playbook '{}' running {}", playbook.name, test.technique_id);

        let technique_invocation = TechniqueInvocation {
            technique_id: test.technique_id.to_string(),
            test_numbers: test.test_numbers.map(|numbers| numbers.to_vec()),
            mode,
            session: session.map(str::to_string),
            any_os: false,
            detail: DetailLevel::Brief,
            interactive: false,
        };
        let outcome = runner.run(&technique_invocation, None).await;

        if !outcome.success {
            overall_success = false;
            warn!(
                "Playbook '{}' test {} failed: {}",
                playbook.name, test.technique_id, outcome.error_kind
            );
        }
        results.push(PlaybookTestResult {
            technique_id: test.technique_id.to_string(),
            description: test.description.to_string(),
            success: outcome.success,
            output: outcome.output,
        });
    }

    PlaybookRunResult {
        overall_success,
        results,
    }
}
