//! Wire codec helper macros, exported for the dependent crates.

/// Bails out of the surrounding function with a truncated-element error
/// when fewer than `$wanted` octets are left in the given reader or
/// writer.
#[macro_export]
macro_rules! ensure_octets {
    ($buf:ident, $wanted:expr, $ctx:expr) => {{
        let wanted = $wanted;
        let available = $buf.remaining();
        if available < wanted {
            return Err($crate::truncated_err($ctx, wanted, available));
        }
    }};
}
