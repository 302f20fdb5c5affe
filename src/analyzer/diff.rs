//! The interface diff an analysis starts from

use super::AnalysisError;
use crate::config::AnalysisConfig;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// `git diff <base> <head>` restricted to the generated code, minus the
/// excluded globs
pub async fn git_diff(
    root: &Path,
    config: &AnalysisConfig,
    base: &str,
    head: &str,
) -> Result<String, AnalysisError> {
    let mut cmd = Command::new("git");
    cmd.arg("diff")
        .arg(base)
        .arg(head)
        .arg("--")
        .arg(&config.gen_dir)
        .args(config.exclude.iter().map(|glob| format!(":!{}", glob)))
        .current_dir(root)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    tracing::debug!(root = %root.display(), base, head, gen_dir = %config.gen_dir, "running git diff");
    let output = cmd.output().await.map_err(|e| AnalysisError::Git {
        status: None,
        stderr: format!("failed to run git: {}", e),
    })?;

    if !output.status.success() {
        return Err(AnalysisError::Git {
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// A diff saved to a file, for replaying a known interface change
pub fn read_diff(path: &Path) -> Result<String, AnalysisError> {
    std::fs::read_to_string(path).map_err(|e| AnalysisError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn git(root: &Path, args: &[&str]) {
        let status = StdCommand::new("git")
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .current_dir(root)
            .output()
            .expect("git should run")
            .status;
        assert!(status.success(), "git {:?}", args);
    }

    fn write(root: &Path, path: &str, content: &str) {
        let path = root.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Two commits touching generated code, protobuf output and SDK code
    fn repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        git(root, &["init", "-q"]);
        write(root, "src/viam/gen/arm_grpc.py", "class ArmServiceBase: ...\n");
        write(root, "src/viam/gen/arm_pb2.py", "DESCRIPTOR = 1\n");
        write(root, "src/viam/arm.py", "class Arm: ...\n");
        git(root, &["add", "."]);
        git(root, &["commit", "-q", "-m", "initial"]);

        write(root, "src/viam/gen/arm_grpc.py", "class ArmServiceBase:\n    def Stop(self): ...\n");
        write(root, "src/viam/gen/arm_pb2.py", "DESCRIPTOR = 2\n");
        write(root, "src/viam/arm.py", "class Arm:\n    pass\n");
        git(root, &["commit", "-q", "-a", "-m", "add Stop"]);
        dir
    }

    #[tokio::test]
    async fn test_diff_covers_generated_code_only() {
        let dir = repo();
        let diff = git_diff(dir.path(), &AnalysisConfig::default(), "HEAD~1", "HEAD")
            .await
            .unwrap();

        assert!(diff.contains("arm_grpc.py"));
        assert!(diff.contains("+    def Stop(self): ..."));
        assert!(!diff.contains("arm_pb2.py"));
        assert!(!diff.contains("src/viam/arm.py"));
    }

    #[tokio::test]
    async fn test_no_changes_is_empty() {
        let dir = repo();
        let diff = git_diff(dir.path(), &AnalysisConfig::default(), "HEAD", "HEAD")
            .await
            .unwrap();
        assert!(diff.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_revision_fails() {
        let dir = repo();
        let result = git_diff(dir.path(), &AnalysisConfig::default(), "no-such-rev", "HEAD").await;
        assert!(matches!(result, Err(AnalysisError::Git { status: Some(_), .. })));
    }

    #[test]
    fn test_read_diff_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proto_diff.txt");
        std::fs::write(&path, "+ rpc Stop").unwrap();
        assert_eq!(read_diff(&path).unwrap(), "+ rpc Stop");
        assert!(matches!(
            read_diff(&dir.path().join("missing.txt")),
            Err(AnalysisError::Read { .. })
        ));
    }
}
