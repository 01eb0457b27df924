//! Shell script standing in for the yt-dlp compatible tool.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

/// Conversion output of a well-behaved run.
pub const GOOD_CONVERSION: &str = r#"echo "[download] Destination: $target"
echo "[download]  10.0% of 2.00MiB"
echo "[download]  55.5% of 2.00MiB"
echo "[download] 100.0% of 2.00MiB"
echo "[ExtractAudio] Destination: $target"
printf 'ID3fake-audio' > "$target"
exit 0"#;

/// Exits cleanly without writing anything.
pub const SILENT_CONVERSION: &str = r#"echo "[download] 100.0% of 2.00MiB"
exit 0"#;

pub struct FakeTool {
    describe: Option<String>,
    members: Vec<String>,
    conversion: String,
}

impl Default for FakeTool {
    fn default() -> Self {
        Self {
            describe: Some("Song|Alice|180".to_string()),
            members: Vec::new(),
            conversion: GOOD_CONVERSION.to_string(),
        }
    }
}

impl FakeTool {
    /// Every `--print` lookup fails like a rejected upstream request.
    pub fn failing_lookups(mut self) -> Self {
        self.describe = None;
        self
    }

    pub fn with_members(mut self, members: &[&str]) -> Self {
        self.members = members.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_conversion(mut self, body: &str) -> Self {
        self.conversion = body.to_string();
        self
    }

    /// Writes the script into `dir` and returns its path.
    pub fn install(&self, dir: &TempDir) -> PathBuf {
        let enumerate = if self.members.is_empty() {
            "echo 'ERROR: not a playlist' >&2; exit 1".to_string()
        } else {
            let lines: Vec<String> = self
                .members
                .iter()
                .map(|m| format!("echo '{}'", m))
                .collect();
            format!("{}\nexit 0", lines.join("\n"))
        };
        let describe = match &self.describe {
            Some(line) => format!("echo '{}'; exit 0", line),
            None => "echo 'ERROR: HTTP Error 403: Forbidden' >&2; exit 1".to_string(),
        };

        let script = format!(
            r#"#!/bin/sh
for arg in "$@"; do
  if [ "$arg" = "--flat-playlist" ]; then
{enumerate}
  fi
done
if [ "$1" = "--print" ]; then
{describe}
fi
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
target=$(echo "$out" | sed 's/%(ext)s/mp3/')
{conversion}
"#,
            enumerate = enumerate,
            describe = describe,
            conversion = self.conversion,
        );

        let path = dir.path().join("fake-yt-dlp");
        std::fs::write(&path, script).expect("Failed to write fake tool");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake tool executable");
        path
    }
}
