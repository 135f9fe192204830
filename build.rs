use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Unprefixed keys the binary falls back to.
const FALLBACK_KEYS: &[&str] = &["OPENAI_API_KEY"];

fn rust_sources(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            rust_sources(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
    Ok(())
}

/// `"KETCHUP_…"` string literals. Identifiers that merely contain the prefix
/// are not env keys and are skipped.
fn quoted_env_keys(source: &str) -> impl Iterator<Item = &str> {
    source.match_indices("\"KETCHUP_").filter_map(move |(at, _)| {
        let rest = &source[at + 1..];
        let end = rest.find('"')?;
        let key = &rest[..end];
        let well_formed = key.len() > "KETCHUP_".len()
            && key
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
        well_formed.then_some(key)
    })
}

fn write_env_keys(out_dir: &Path) -> std::io::Result<usize> {
    let mut sources = Vec::new();
    rust_sources(Path::new("src"), &mut sources)?;

    let mut keys: BTreeSet<String> = FALLBACK_KEYS.iter().map(|k| k.to_string()).collect();
    for path in sources {
        let source = fs::read_to_string(&path)?;
        keys.extend(quoted_env_keys(&source).map(str::to_string));
    }

    let mut f = fs::File::create(out_dir.join("ketchup_env_allowlist.rs"))?;
    writeln!(f, "pub const GENERATED_KETCHUP_ENV_ALLOWLIST: &[&str] = &[")?;
    for key in &keys {
        writeln!(f, "    {key:?},")?;
    }
    writeln!(f, "];")?;
    Ok(keys.len())
}

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let count = write_env_keys(&out_dir).expect("failed to collect KETCHUP env keys");
    if count == FALLBACK_KEYS.len() {
        println!("cargo:warning=no KETCHUP_ env keys found under src/");
    }

    // Identifies the binary that holds the watch lock.
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    println!(
        "cargo:rustc-env=BUILD_UUID={:x}-{:x}",
        now.as_secs(),
        now.subsec_nanos()
    );
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
}
