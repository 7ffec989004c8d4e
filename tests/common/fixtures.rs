//! Fake extraction tools
//!
//! Each script accepts the same arguments yt-dlp receives and fakes one behavior.
//! `out` holds the `-o` template and `url` the locator after `--`.

/// Argument parsing shared by all scripts
const PARSE_ARGS: &str = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    --) shift; break ;;
    *) shift ;;
  esac
done
url="$1"
dir=$(dirname "$out")
"#;

/// Writes the templated file and prints its path
pub const WRITES_TEMPLATE: &str = r#"
path=$(printf '%s' "$out" | sed 's/%(ext)s/m4a/')
printf 'media' > "$path"
echo "$path"
"#;

/// Writes a differently named file and prints a path that does not exist
pub const REPORTS_BOGUS_PATH: &str = r#"
printf 'media' > "$dir/Some Title.m4a"
echo "/nowhere/bogus.m4a"
"#;

/// Fails like yt-dlp on an unavailable video
pub const FAILS: &str = r#"
echo "ERROR: [youtube] $url: Video unavailable" >&2
exit 1
"#;

/// Succeeds without producing anything
pub const PRODUCES_NOTHING: &str = r#"
echo "[download] nothing to do"
"#;

/// Leaves a partial download behind and then fails
pub const LEAVES_PARTIAL: &str = r#"
printf 'half' > "$dir/clip.m4a.part"
echo "ERROR: interrupted" >&2
exit 2
"#;

/// Complete script for the given behavior
pub fn script(body: &str) -> String {
    format!("{PARSE_ARGS}{body}")
}
