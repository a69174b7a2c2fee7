//! Identifier normalization between IR names and Python names.

/// Python keywords; an identifier equal to one of these gets a trailing `_`.
pub const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Locals of generated functions that parameters must not shadow.
pub const GENERATED_LOCALS: &[&str] = &[
    "args",
    "boundary_needed",
    "child",
    "conn",
    "ctx",
    "current",
    "current_key",
    "cursor",
    "parent_key",
    "parts",
    "result",
    "row",
    "row_dict",
    "rows",
    "sql",
    "sql_parts",
    "status",
];

/// Convert camelCase / PascalCase / kebab-case to snake_case.
///
/// Acronyms stay together: `HTTPServer` becomes `http_server`, `userID` becomes `user_id`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' || c == '.' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }

        if c.is_uppercase() {
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

/// Convert snake_case to PascalCase: split on `_`, capitalize each part.
pub fn to_pascal_case(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Result type name for a query function: `get_user_by_id` -> `GetUserByIdResult`.
pub fn generate_class_name(function_name: &str) -> String {
    format!("{}Result", to_pascal_case(&to_snake_case(function_name)))
}

/// Type name of a nested group: the main type name followed by each segment in PascalCase.
pub fn child_class_name(main_class: &str, path_segments: &[String]) -> String {
    let mut name = main_class.to_string();
    for segment in path_segments {
        name.push_str(&to_pascal_case(&to_snake_case(segment)));
    }
    name
}

/// A valid, non-keyword Python identifier in snake_case.
pub fn python_identifier(name: &str) -> String {
    let snake = to_snake_case(name);
    let mut ident: String = snake
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if ident.is_empty() {
        return "_".to_string();
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if PYTHON_KEYWORDS.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

/// Identifier for a function parameter or other name visible inside generated bodies.
pub fn param_identifier(name: &str) -> String {
    let mut ident = python_identifier(name);
    if GENERATED_LOCALS.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("UserID"), "user_id");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("kebab-name"), "kebab_name");
        assert_eq!(to_snake_case("v2Name"), "v2_name");
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_pascal_case("get_user_by_id"), "GetUserById");
        assert_eq!(to_pascal_case("board"), "Board");
        assert_eq!(to_pascal_case("__weird__"), "Weird");
    }

    #[test]
    fn test_class_names() {
        assert_eq!(generate_class_name("get_user_by_id"), "GetUserByIdResult");
        assert_eq!(generate_class_name("getUserById"), "GetUserByIdResult");
        assert_eq!(
            child_class_name("ListBoardsResult", &["lists".to_string(), "cards".to_string()]),
            "ListBoardsResultListsCards"
        );
    }

    #[test]
    fn test_python_identifier() {
        assert_eq!(python_identifier("class"), "class_");
        assert_eq!(python_identifier("from"), "from_");
        assert_eq!(python_identifier("id"), "id");
        assert_eq!(python_identifier("2fa"), "_2fa");
        assert_eq!(python_identifier("user.name"), "user_name");
        assert_eq!(param_identifier("args"), "args_");
        assert_eq!(param_identifier("user_id"), "user_id");
    }

    #[test]
    fn test_execution_locals_are_not_shadowed() {
        for local in ["row", "rows", "row_dict", "result", "current", "current_key", "parent_key"] {
            assert_eq!(param_identifier(local), format!("{local}_"));
        }
        assert_eq!(param_identifier("rowCount"), "row_count");
    }
}
