use crate::output::UserOutput;
use std::path::Path;

const TEMPLATE: &str = r#"# dbkeeper configuration
# Values in the process environment override this file.

# ── Required ─────────────────────────────────────────────
# Only applied when the data volume is first initialized.
DB_ROOT_PASSWORD=change-me
DB_NAME=app
DB_USER=app
DB_PASSWORD=change-me-too

# ── Container ────────────────────────────────────────────
# mysql or mariadb
#DB_ENGINE=mysql
# Defaults to mysql:8.4 or mariadb:11.4 depending on the engine
#DB_IMAGE=mysql:8.4
# Prefix for the container (<project>-db) and network (<project>-net)
#DB_PROJECT=dbkeeper
# Host port published for the database
#DB_PORT=3306
# no, always, unless-stopped or on-failure[:N]
#DB_RESTART_POLICY=always
#DB_MEMORY=1g
#DB_CPUS=1.5
# Extra arguments for the server, split on whitespace
#DB_SERVER_ARGS=--character-set-server=utf8mb4

# ── Storage ──────────────────────────────────────────────
# Relative paths resolve against the directory of this file
#DB_DATA_DIR=data
# *.sql / *.sh scripts run once when the volume is empty
#DB_INIT_SCRIPTS=initdb

# ── Readiness ────────────────────────────────────────────
# tcp (protocol handshake) or auth (handshake plus a login as DB_USER)
#DB_HEALTH_PROBE=auth
#DB_HEALTH_RETRIES=30
# Initial backoff, doubled after each failed attempt up to 30s
#DB_HEALTH_INTERVAL=1s
#DB_HEALTH_TIMEOUT=5s

# ── Timeouts and bookkeeping ────────────────────────────
#DB_RUNTIME_TIMEOUT=120s
#DB_STOP_GRACE=10s
#DB_AUDIT_LOG=.dbkeeper/audit.jsonl
"#;

pub fn run_init(output: &Path, force: bool, out: &dyn UserOutput) -> anyhow::Result<()> {
    if output.exists() && !force {
        out.error(&format!("Error: {} already exists", output.display()));
        out.error("Use --force to overwrite");
        return Err(anyhow::anyhow!("File already exists: {}", output.display()));
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, TEMPLATE)?;
    out.success(&format!("Created {}", output.display()));
    out.status("\nNext steps:");
    out.status(&format!(
        "  1. Set the passwords in {}",
        output.display()
    ));
    out.status("  2. Add .env, data/ and .dbkeeper/ to .gitignore");
    out.status("  3. Run: dbkeeper up");

    Ok(())
}
