// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup/restore byte-plumbing for the agent's `storage/` directory (spec
//! §4.3 component H, steps 2 and 5). No archive format handling lives
//! here — `tar -czf`/`tar xzf` run *inside* the sandbox via `exec`; this
//! module only moves bytes between the sandbox and whatever the caller
//! does with them (the object store, in `scp-workflow`).

use crate::adapter::{ExecOptions, SandboxAdapter, SandboxError};

const ARCHIVE_PATH: &str = "/tmp/opencode-storage.tar.gz";

/// Run `tar -czf` over `storage_dir` inside the sandbox and return the
/// resulting archive bytes, or `None` if the directory does not exist
/// (nothing to back up — advisory, never causal to run success per spec
/// §4.3 step 5).
pub async fn export_storage_dir(
    adapter: &dyn SandboxAdapter,
    sandbox_id: &str,
    storage_dir: &str,
) -> Result<Option<Vec<u8>>, SandboxError> {
    if !adapter.file_exists(sandbox_id, storage_dir).await? {
        return Ok(None);
    }

    let parent = parent_dir(storage_dir);
    let leaf = leaf_name(storage_dir);
    adapter
        .exec(
            sandbox_id,
            ExecOptions::new("tar").args(["-czf", ARCHIVE_PATH, &leaf]).cwd(parent),
        )
        .await?;

    if !adapter.file_exists(sandbox_id, ARCHIVE_PATH).await? {
        return Ok(None);
    }
    let bytes = adapter.read_file(sandbox_id, ARCHIVE_PATH).await?;
    adapter.exec(sandbox_id, ExecOptions::new("rm").args(["-f", ARCHIVE_PATH])).await?;
    Ok(bytes)
}

/// Write `archive` into the sandbox and untar it into `storage_dir`'s
/// parent (spec §4.3 step 2 restore path).
pub async fn import_storage_dir(
    adapter: &dyn SandboxAdapter,
    sandbox_id: &str,
    storage_dir: &str,
    archive: &[u8],
) -> Result<(), SandboxError> {
    adapter.write_file(sandbox_id, ARCHIVE_PATH, archive).await?;
    let parent = parent_dir(storage_dir);
    adapter
        .exec(sandbox_id, ExecOptions::new("mkdir").args(["-p", &parent]))
        .await?;
    adapter
        .exec(
            sandbox_id,
            ExecOptions::new("tar").args(["-xzf", ARCHIVE_PATH, "-C", &parent]),
        )
        .await?;
    adapter.exec(sandbox_id, ExecOptions::new("rm").args(["-f", ARCHIVE_PATH])).await?;
    Ok(())
}

fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => path[..i].to_string(),
        None => ".".to_string(),
    }
}

fn leaf_name(path: &str) -> String {
    match path.rfind('/') {
        Some(i) => path[i + 1..].to_string(),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeSandbox;

    #[tokio::test]
    async fn export_returns_none_when_storage_dir_missing() {
        let sandbox = FakeSandbox::new();
        let bytes = export_storage_dir(&sandbox, "sb-1", "/root/.local/share/opencode/storage")
            .await
            .unwrap();
        assert!(bytes.is_none());
    }

    #[tokio::test]
    async fn export_then_import_round_trips_file_contents() {
        let sandbox = FakeSandbox::new();
        sandbox
            .write_file("sb-1", "/root/.local/share/opencode/storage/session/a.json", b"{}")
            .await
            .unwrap();

        let archive = export_storage_dir(&sandbox, "sb-1", "/root/.local/share/opencode/storage")
            .await
            .unwrap()
            .expect("archive produced");

        let sandbox2 = FakeSandbox::new();
        import_storage_dir(&sandbox2, "sb-2", "/root/.local/share/opencode/storage", &archive)
            .await
            .unwrap();

        let restored = sandbox2
            .read_file("sb-2", "/root/.local/share/opencode/storage/session/a.json")
            .await
            .unwrap();
        assert_eq!(restored, Some(b"{}".to_vec()));
    }
}
