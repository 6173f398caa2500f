//! Durable machine identity for advertisement names.
//!
//! The advertised instance name must be stable across runs on the same
//! machine (so renames converge) but unique across machines. Prefer the
//! systemd machine id, fall back to the hostname, and as a last resort use a
//! random id that at least stays unique for this run.

use std::path::Path;

use tracing::warn;

const MACHINE_ID_PATH: &str = "/etc/machine-id";

pub fn machine_name() -> String {
    machine_name_from(Path::new(MACHINE_ID_PATH))
}

fn machine_name_from(machine_id_path: &Path) -> String {
    if let Ok(id) = std::fs::read_to_string(machine_id_path) {
        let id = id.trim();
        if !id.is_empty() {
            return id.to_string();
        }
    }

    if let Some(host) = hostname::get().ok().and_then(|h| h.into_string().ok()) {
        if !host.is_empty() {
            return host;
        }
    }

    warn!("no machine id or hostname available, using a random identity");
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn machine_id_file_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("machine-id");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "0123456789abcdef0123456789abcdef").unwrap();

        assert_eq!(
            machine_name_from(&path),
            "0123456789abcdef0123456789abcdef"
        );
    }

    #[test]
    fn missing_file_still_yields_a_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let name = machine_name_from(&dir.path().join("missing"));
        assert!(!name.is_empty());
    }
}
