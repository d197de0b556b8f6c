//! External runtime symbols the middle-end emits calls to. The middle-end
//! assumes nothing about their implementation beyond the calling convention.

/// `eddi_alloc(size) -> ptr`
pub const ALLOC: &str = "eddi_alloc";
/// `concat(p1, l1, p2, l2) -> (p, l)`
pub const CONCAT: &str = "concat";

pub const PRINT_INTEGER: &str = "print_integer";
pub const PRINT_FLOAT: &str = "print_float";
pub const PRINT_BOOL: &str = "print_bool";
pub const PRINT_STRING: &str = "print_string";
pub const PRINTLN: &str = "println";

/// `time() -> 64-bit counter`
pub const TIME: &str = "time";
/// `duration(start, end) -> integer`
pub const DURATION: &str = "duration";

/// Prefix for the labels of global variables.
pub const GLOBAL_PREFIX: &str = "V";
