/// Scanner service names mapped to the credential-cracker module that can
/// attack them. Names the scanner reports that have no entry here are a
/// recoverable "no compatible module" condition, never an error.
const MODULE_TABLE: &[(&str, &str)] = &[
    ("ftp", "ftp"),
    ("ssh", "ssh"),
    ("telnet", "telnet"),
    ("http", "http"),
    ("https", "http"),
    ("pop3", "pop3"),
    ("imap", "imap"),
    ("netbios-ssn", "smb"),
    ("microsoft-ds", "smb"),
    ("ms-wbt-server", "rdp"),
    ("vnc", "vnc"),
    ("mysql", "mysql"),
    ("postgresql", "psql"),
    ("ms-sql-s", "mssql"),
    ("mongodb", "mongodb"),
    ("redis", "redis"),
    ("wsman", "winrm"),
];

pub fn module_for(service_name: &str) -> Option<&'static str> {
    let wanted = service_name.to_lowercase();
    MODULE_TABLE
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, module)| *module)
}

/// Target reference in the cracker's `module://host:port` form
pub fn target_reference(module: &str, host: &str, port: u16) -> String {
    format!("{module}://{host}:{port}")
}
