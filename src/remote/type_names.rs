//! Server-side type names used in operation signatures and responses.

/// `java.lang.Object`
pub const OBJECT: &str = "java.lang.Object";
/// `java.lang.String`
pub const STRING: &str = "java.lang.String";
/// `void`, the result type of operations returning nothing.
pub const VOID: &str = "void";

/// `boolean`
pub const BOOLEAN: &str = "boolean";
/// `byte`
pub const BYTE: &str = "byte";
/// `char`
pub const CHAR: &str = "char";
/// `short`
pub const SHORT: &str = "short";
/// `int`
pub const INT: &str = "int";
/// `long`
pub const LONG: &str = "long";
/// `float`
pub const FLOAT: &str = "float";
/// `double`
pub const DOUBLE: &str = "double";

/// Array descriptor symbol for a primitive type name.
fn primitive_symbol(name: &str) -> Option<char> {
    match name {
        BOOLEAN => Some('Z'),
        BYTE => Some('B'),
        CHAR => Some('C'),
        SHORT => Some('S'),
        INT => Some('I'),
        LONG => Some('J'),
        FLOAT => Some('F'),
        DOUBLE => Some('D'),
        _ => None,
    }
}

/// Type name of an array whose elements have type `element`.
///
/// Follows the JVM descriptor form: `int` becomes `[I`, `java.lang.String`
/// becomes `[Ljava.lang.String;` and array names nest as `[[I`.
pub fn array_of(element: &str) -> String {
    if element.starts_with('[') {
        format!("[{}", element)
    } else if let Some(symbol) = primitive_symbol(element) {
        format!("[{}", symbol)
    } else {
        format!("[L{};", element)
    }
}
