//! `battlefield compare`: structural comparison of two JSON documents.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Value, json};

use crate::opts::GlobalOpts;
use crate::output::{print_json, read_json};

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Expected (oracle) document
    pub expected: PathBuf,

    /// Actual document
    pub actual: PathBuf,

    /// On mismatch, copy the actual document over the expected one
    #[arg(long)]
    pub accept: bool,
}

/// One differing location in a pair of documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Difference {
    pub path: String,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
}

impl Difference {
    fn render(&self) -> String {
        let show = |value: &Option<Value>| match value {
            Some(value) => value.to_string(),
            None => "<missing>".to_string(),
        };
        format!(
            "{}: expected {}, actual {}",
            self.path,
            show(&self.expected),
            show(&self.actual)
        )
    }
}

/// Every path at which `actual` departs from `expected`, in document order.
pub fn diff(expected: &Value, actual: &Value) -> Vec<Difference> {
    let mut out = Vec::new();
    diff_at("$", expected, actual, &mut out);
    out
}

fn diff_at(path: &str, expected: &Value, actual: &Value, out: &mut Vec<Difference>) {
    match (expected, actual) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, value) in left {
                let child = format!("{path}.{key}");
                match right.get(key) {
                    Some(other) => diff_at(&child, value, other, out),
                    None => out.push(Difference {
                        path: child,
                        expected: Some(value.clone()),
                        actual: None,
                    }),
                }
            }
            for (key, value) in right {
                if !left.contains_key(key) {
                    out.push(Difference {
                        path: format!("{path}.{key}"),
                        expected: None,
                        actual: Some(value.clone()),
                    });
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            for ix in 0..left.len().max(right.len()) {
                let child = format!("{path}[{ix}]");
                match (left.get(ix), right.get(ix)) {
                    (Some(a), Some(b)) => diff_at(&child, a, b, out),
                    (a, b) => out.push(Difference {
                        path: child,
                        expected: a.cloned(),
                        actual: b.cloned(),
                    }),
                }
            }
        }
        (a, b) if a != b => out.push(Difference {
            path: path.to_string(),
            expected: Some(a.clone()),
            actual: Some(b.clone()),
        }),
        _ => {}
    }
}

/// Compare two files. Returns whether they ended up equal, accepting the
/// actual file when asked.
pub fn compare_files(
    opts: &GlobalOpts,
    expected: &Path,
    actual: &Path,
    accept: bool,
) -> Result<bool> {
    let actual_doc = read_json(actual)?;
    let differences = if expected.exists() {
        diff(&read_json(expected)?, &actual_doc)
    } else {
        vec![Difference {
            path: "$".into(),
            expected: None,
            actual: Some(Value::String(format!("{}", actual.display()))),
        }]
    };
    let equal = differences.is_empty();

    if accept && !equal {
        fs::copy(actual, expected).with_context(|| {
            format!("copy {} to {}", actual.display(), expected.display())
        })?;
        tracing::info!(expected = %expected.display(), "accepted actual document");
    }

    if opts.json {
        let rendered: Vec<_> = differences
            .iter()
            .map(|d| json!({ "path": d.path, "expected": d.expected, "actual": d.actual }))
            .collect();
        print_json(
            opts,
            &json!({
                "expected": expected.display().to_string(),
                "actual": actual.display().to_string(),
                "equal": equal,
                "accepted": accept && !equal,
                "differences": rendered,
            }),
        )?;
    } else if equal {
        println!("Files are equal, all good");
    } else {
        println!(
            "{} and {} differ at {} path(s):",
            expected.display(),
            actual.display(),
            differences.len()
        );
        for difference in &differences {
            println!("  {}", difference.render());
        }
        if accept {
            println!("Accepted {} as {}", actual.display(), expected.display());
        } else {
            println!(
                "If the actual output is correct, accept it with: cp {} {}",
                actual.display(),
                expected.display()
            );
        }
    }
    Ok(equal || accept)
}

pub fn cmd_compare(opts: &GlobalOpts, args: &CompareArgs) -> Result<bool> {
    compare_files(opts, &args.expected, &args.actual, args.accept)
}
