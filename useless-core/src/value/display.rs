//! Diagnostic rendering.
//!
//! `Display` produces the short, single-line form used in log events and
//! error messages. Long containers are elided after a fixed number of entries
//! and nesting is cut off at a fixed depth.

use std::fmt::{self, Write};

use super::Value;

const MAX_ENTRIES: usize = 8;
const MAX_DEPTH: usize = 4;

/// Render any value to a short diagnostic string.
pub fn stringify(value: &Value) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = render(value, 0, &mut out);
    out
}

fn render(value: &Value, depth: usize, out: &mut String) -> fmt::Result {
    match value {
        Value::Undefined => out.write_str("undefined"),
        Value::Null => out.write_str("null"),
        Value::Bool(b) => write!(out, "{b}"),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                write!(out, "{}", *n as i64)
            } else {
                write!(out, "{n}")
            }
        }
        Value::Str(s) => write!(out, "{s:?}"),
        Value::List(items) => render_seq(items, "[", "]", depth, out),
        Value::Set(items) => render_seq(items, "Set{", "}", depth, out),
        Value::Map(map) => {
            if depth >= MAX_DEPTH {
                return out.write_str("{…}");
            }
            out.write_char('{')?;
            for (i, (k, v)) in map.iter().enumerate() {
                if i == MAX_ENTRIES {
                    out.write_str(", …")?;
                    break;
                }
                if i > 0 {
                    out.write_str(", ")?;
                }
                write!(out, "{k}: ")?;
                render(v, depth + 1, out)?;
            }
            out.write_char('}')
        }
        Value::Func(f) => match f.name() {
            Some(name) => write!(out, "<fn {name}>"),
            None => out.write_str("<fn>"),
        },
        Value::Tagged(t) => {
            for keyword in t.keywords().keys() {
                write!(out, "{keyword} ")?;
            }
            render(t.subject(), depth, out)
        }
        Value::Object(i) => write!(out, "<{} #{}>", i.prototype().name(), i.id()),
        Value::Type(t) => write!(out, "<type {}>", t.name()),
        Value::Stream(s) => write!(out, "<{} #{}>", s.kind().name(), s.id()),
        Value::Promise(p) => write!(out, "<promise #{}>", p.id()),
    }
}

fn render_seq(items: &[Value], open: &str, close: &str, depth: usize, out: &mut String) -> fmt::Result {
    if depth >= MAX_DEPTH {
        return write!(out, "{open}…{close}");
    }
    out.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i == MAX_ENTRIES {
            out.write_str(", …")?;
            break;
        }
        if i > 0 {
            out.write_str(", ")?;
        }
        render(item, depth + 1, out)?;
    }
    out.write_str(close)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&stringify(self))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", stringify(self))
    }
}
