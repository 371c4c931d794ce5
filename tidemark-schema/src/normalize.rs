//! Canonicalization of SQL fragments so equivalent definitions compare equal.

use crate::dialect::Dialect;

/// Normalize an SQL expression for comparison.
///
/// Whitespace runs outside quoted text collapse to one space, spaces next to
/// parentheses and commas are dropped, and redundant outer parentheses are
/// removed.
pub fn normalize_expression(expr: &str) -> String {
    let collapsed = collapse_whitespace(expr);
    let mut current = collapsed.as_str();
    loop {
        let stripped = strip_outer_parens(current);
        if stripped.len() == current.len() {
            break;
        }
        current = stripped.trim();
    }
    current.to_string()
}

/// Normalize a column type name.
///
/// Built-in names are lower-cased. On Postgres common aliases are folded to
/// their canonical spelling.
pub fn normalize_type(sql_type: &str, dialect: Dialect) -> String {
    let collapsed = collapse_whitespace(sql_type);
    let (base, suffix) = match collapsed.find('(') {
        Some(pos) => collapsed.split_at(pos),
        None => (collapsed.as_str(), ""),
    };
    let base = base.trim().to_lowercase();
    if dialect != Dialect::Postgresql {
        return format!("{}{}", base, suffix);
    }
    let base = match base.as_str() {
        "int" | "int4" => "integer",
        "int2" => "smallint",
        "int8" => "bigint",
        "bool" => "boolean",
        "float8" => "double precision",
        "float4" => "real",
        "timestamp without time zone" => "timestamp",
        "timestamp with time zone" => "timestamptz",
        "character varying" => "varchar",
        other => other,
    };
    format!("{}{}", base, suffix)
}

/// Collapse whitespace outside single/double quoted text.
fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;

    for ch in input.trim().chars() {
        if let Some(q) = quote {
            out.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            let prev = out.chars().last();
            let glue = matches!(prev, Some('(') | Some(',')) || matches!(ch, ')' | ',');
            if !glue && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
        }
        if ch == '\'' || ch == '"' {
            quote = Some(ch);
        }
        out.push(ch);
    }
    out
}

/// Remove one pair of parentheses wrapping the entire expression.
fn strip_outer_parens(expr: &str) -> &str {
    let bytes = expr.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'(' || bytes[bytes.len() - 1] != b')' {
        return expr;
    }
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != bytes.len() - 1 {
                    return expr;
                }
            }
            _ => {}
        }
    }
    &expr[1..expr.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_expression_whitespace() {
        assert_eq!(normalize_expression("lower( email )"), "lower(email)");
        assert_eq!(normalize_expression("  a  >   1 "), "a > 1");
        assert_eq!(normalize_expression("coalesce(a ,  b)"), "coalesce(a,b)");
    }

    #[test]
    fn test_normalize_expression_outer_parens() {
        assert_eq!(normalize_expression("((a > 1))"), "a > 1");
        assert_eq!(normalize_expression("(a) + (b)"), "(a) + (b)");
    }

    #[test]
    fn test_normalize_expression_keeps_quoted_text() {
        assert_eq!(
            normalize_expression("name = 'a   b'"),
            "name = 'a   b'"
        );
    }

    #[test]
    fn test_normalize_type_aliases() {
        let pg = Dialect::Postgresql;
        assert_eq!(normalize_type("INT4", pg), "integer");
        assert_eq!(normalize_type("character varying(255)", pg), "varchar(255)");
        assert_eq!(normalize_type("Timestamp With Time Zone", pg), "timestamptz");
        assert_eq!(normalize_type("numeric( 10, 2 )", pg), "numeric(10,2)");
        assert_eq!(normalize_type("text", pg), "text");
    }

    #[test]
    fn test_normalize_type_keeps_mysql_names() {
        assert_eq!(normalize_type("INT", Dialect::Mysql), "int");
        assert_eq!(normalize_type("VARCHAR( 64 )", Dialect::Mysql), "varchar(64)");
        assert_eq!(
            normalize_type("ENUM('Active','Gone')", Dialect::Mysql),
            "enum('Active','Gone')"
        );
    }
}
