//! Lint the .env file for drmsync: duplicate keys, missing required keys,
//! blank values. Secrets are masked in all output.

use std::{collections::HashMap, env, fs, path::Path};

const REQUIRED: &[&str] = &[
    "SHOPIFY_SHOP_NAME",
    "SHOPIFY_ACCESS_TOKEN",
    "EDITIONGUARD_API_KEY",
    "S3_BUCKET_NAME",
    "S3_BUCKET_REGION",
    "LOCAL_EBOOKS_PATH",
];

const OPTIONAL: &[&str] = &[
    "AWS_ACCESS_KEY",
    "AWS_SECRET_KEY",
    "S3_EBOOKS_PATH",
    "HTTP_TIMEOUT_SECS",
];

fn is_secret(key: &str) -> bool {
    key.contains("TOKEN") || key.contains("KEY") || key.contains("SECRET")
}

fn mask(key: &str, val: &str) -> String {
    if !is_secret(key) {
        return val.to_string();
    }
    if val.len() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", &val[..4])
    }
}

fn parse_env_lines(contents: &str) -> Vec<(usize, String, String)> {
    let mut out = Vec::new();
    for (idx, raw) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let mut line = raw.trim().to_string();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("export ") {
            line = rest.trim().to_string();
        }
        let Some(eq) = line.find('=') else {
            continue;
        };
        let key = line[..eq].trim().to_string();
        let mut val = line[eq + 1..].trim().to_string();
        if (val.starts_with('"') && val.ends_with('"') && val.len() >= 2)
            || (val.starts_with('\'') && val.ends_with('\'') && val.len() >= 2)
        {
            val = val[1..val.len() - 1].to_string();
        }
        if key.is_empty() {
            continue;
        }
        out.push((line_no, key, val));
    }
    out
}

fn main() {
    // Optional arg: path to .env (default ".env")
    let path = env::args().nth(1).unwrap_or_else(|| ".env".to_string());
    if !Path::new(&path).exists() {
        eprintln!("No .env found at {}", path);
        std::process::exit(2);
    }
    let contents = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path, e);
            std::process::exit(2);
        }
    };

    let entries = parse_env_lines(&contents);
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut has_errors = false;

    for (line, key, val) in &entries {
        if let Some(first_line) = first_seen.get(key) {
            eprintln!(
                "DUPLICATE {key}: line {first_line} and line {line} (last one wins with most loaders)"
            );
            has_errors = true;
        } else {
            first_seen.insert(key.clone(), *line);
        }
        if val.trim().is_empty() {
            eprintln!("EMPTY {key}: line {line} has no value");
            has_errors = true;
        }
    }

    for key in REQUIRED {
        match entries.iter().rev().find(|(_, k, _)| k == key) {
            Some((_, _, val)) => println!("ok  {key}={}", mask(key, val)),
            None => {
                eprintln!("MISSING required key {key}");
                has_errors = true;
            }
        }
    }
    for key in OPTIONAL {
        if let Some((_, _, val)) = entries.iter().rev().find(|(_, k, _)| k == key) {
            println!("opt {key}={}", mask(key, val));
        }
    }

    for key in first_seen.keys() {
        if !REQUIRED.contains(&key.as_str()) && !OPTIONAL.contains(&key.as_str()) {
            println!("??? {key} is not used by drmsync");
        }
    }

    if has_errors {
        std::process::exit(1);
    }
    println!("{} looks usable", path);
}
