use super::Error;

pub const UNEXPECTED_MARKUP: &str = "unexpected markup";
pub const UNEXPECTED_EOF: &str = "unexpected eof";
pub const INVALID_BINDING: &str = "invalid binding";
pub const INVALID_DIRECTIVE: &str = "invalid directive";
pub const MISSING_SCOPE: &str = "missing scope";
pub const MISMATCHED_VALUES: &str = "mismatched values";

/// Return an [`Error`] explaining that the end of the joined source was
/// not expected.
pub fn error_eof(source: &str) -> Error {
    let source_len = source.len();
    Error::build(UNEXPECTED_EOF)
        .with_pointer(source, source_len..source_len)
        .with_help("expected additional markup, did you close every element and comment?")
}

/// Return an [`Error`] describing a boolean attribute binding surrounded
/// by literal text.
pub fn error_boolean_literal(name: &str) -> Error {
    Error::build(INVALID_BINDING).with_help(format!(
        "boolean attribute `{name}` must contain a single binding spanning the \
        whole value, with no literal text around it"
    ))
}

/// Return an [`Error`] describing an attribute whose placeholder value did
/// not parse back to the expected marker-delimited form.
pub fn error_malformed_binding(chunk: &str) -> Error {
    Error::build(INVALID_BINDING).with_help(format!(
        "the text before this binding (`{chunk}`) does not look like an attribute \
        assignment, so the binding position cannot be recovered"
    ))
}

/// Return an [`Error`] describing a directive that kept yielding directives
/// without settling on a value.
pub fn error_directive_loop() -> Error {
    Error::build(INVALID_DIRECTIVE)
        .with_help("directive resolution did not settle, is a directive returning itself?")
}

/// Return an [`Error`] describing a render pass given the wrong number
/// of values.
pub fn error_value_count(expected: usize, received: usize) -> Error {
    Error::build(MISMATCHED_VALUES).with_help(format!(
        "template has {expected} bindings but received {received} values, \
        was the description built from different literal chunks?"
    ))
}

/// Return an [`Error`] describing a missing scope name.
pub fn error_missing_scope() -> Error {
    Error::build(MISSING_SCOPE)
        .with_help("this operation is scoped, set `scope` on the render options")
}
