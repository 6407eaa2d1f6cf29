//! Mock Hurl runner for integration testing
//!
//! Accepts the same command line as `hurl --report-json` and writes a report
//! in the same shape, without doing any network I/O. Every request "answers"
//! 200 with a JSON body echoing the method, the URL and the variables.
//!
//! Script lines it understands:
//! - `GET url` (or any other method): starts an entry, `{{name}}` is substituted
//! - `HTTP <code>`: asserts the status of the current entry
//! - `# no-body-file`: the current entry references a body that is never written
//! - `CRASH`: fail without writing a report
//! - `GARBAGE`: write a report that is not JSON

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

const METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

#[derive(Default)]
struct MockEntry {
    method: String,
    url: String,
    line: usize,
    expected_status: Option<u16>,
    skip_body_file: bool,
}

fn main() {
    let mut report_dir: Option<PathBuf> = None;
    let mut variables = BTreeMap::new();
    let mut positional = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--report-json" => report_dir = args.next().map(PathBuf::from),
            "--variable" => {
                if let Some((k, v)) = args.next().as_deref().and_then(|kv| kv.split_once('=')) {
                    variables.insert(k.to_string(), v.to_string());
                }
            }
            flag if flag.starts_with("--") => {}
            _ => positional.push(arg),
        }
    }

    let Some(script) = positional.last().map(PathBuf::from) else {
        eprintln!("error: no input file");
        std::process::exit(1);
    };

    let source = match std::fs::read_to_string(&script) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read {}: {}", script.display(), e);
            std::process::exit(1);
        }
    };

    let mut entries: Vec<MockEntry> = Vec::new();
    for (number, line) in source.lines().enumerate() {
        let line = line.trim();
        if line == "CRASH" {
            eprintln!("error: runner crashed on line {}", number + 1);
            std::process::exit(3);
        }
        if line == "GARBAGE" {
            if let Some(dir) = &report_dir {
                std::fs::create_dir_all(dir).unwrap();
                std::fs::write(dir.join("report.json"), "this is not json").unwrap();
            }
            println!("garbage report written");
            return;
        }
        if line == "# no-body-file" {
            if let Some(entry) = entries.last_mut() {
                entry.skip_body_file = true;
            }
            continue;
        }
        if let Some(code) = line.strip_prefix("HTTP ") {
            if let Some(entry) = entries.last_mut() {
                entry.expected_status = code.trim().parse().ok();
            }
            continue;
        }
        if let Some((method, url)) = line.split_once(' ') {
            if METHODS.contains(&method) {
                entries.push(MockEntry {
                    method: method.to_string(),
                    url: substitute(url.trim(), &variables),
                    line: number + 1,
                    ..Default::default()
                });
            }
        }
    }

    let mut success = true;
    let mut report_entries = Vec::new();
    let mut last_body = String::new();

    for (i, entry) in entries.iter().enumerate() {
        let index = i + 1;
        let body = json!({
            "method": entry.method,
            "url": entry.url,
            "variables": variables,
        })
        .to_string();

        let body_file = format!("store/{:04}-response.bin", index);
        if let Some(dir) = &report_dir {
            if !entry.skip_body_file {
                write_body(dir, &body_file, &body);
            }
        }

        let asserts: Vec<Value> = entry
            .expected_status
            .map(|expected| {
                let passed = expected == 200;
                if !passed {
                    success = false;
                    eprintln!(
                        "error: Assert status code\n  --> {}:{}\n   | expected: {}, actual: 200",
                        script.display(),
                        entry.line,
                        expected
                    );
                }
                vec![json!({"line": entry.line, "success": passed})]
            })
            .unwrap_or_default();

        report_entries.push(json!({
            "index": index,
            "line": entry.line,
            "time": 1,
            "curl_cmd": format!("curl -X {} '{}'", entry.method, entry.url),
            "asserts": asserts,
            "captures": [],
            "calls": [{
                "request": {
                    "method": entry.method,
                    "url": entry.url,
                    "headers": [],
                    "query_string": [],
                    "cookies": [],
                },
                "response": {
                    "status": 200,
                    "http_version": "HTTP/1.1",
                    "headers": [{"name": "Content-Type", "value": "application/json"}],
                    "cookies": [],
                    "body": body_file,
                },
                "timings": {
                    "begin_call": "2024-01-01T00:00:00Z",
                    "end_call": "2024-01-01T00:00:00Z",
                    "total": 1000,
                },
            }],
        }));
        last_body = body;
    }

    if let Some(dir) = &report_dir {
        let report = json!([{
            "filename": script.display().to_string(),
            "success": success,
            "time": entries.len(),
            "cookies": [],
            "entries": report_entries,
        }]);
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("report.json"), report.to_string()).unwrap();
    }

    if !last_body.is_empty() {
        let mut stdout = std::io::stdout();
        writeln!(stdout, "{}", last_body).unwrap();
        stdout.flush().unwrap();
    }

    if !success {
        std::process::exit(4);
    }
}

fn write_body(dir: &Path, relative: &str, body: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, body).unwrap();
}

fn substitute(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in variables {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}
