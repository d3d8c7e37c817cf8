/// Prints to standard output through the intercepting router.
///
/// Same syntax as [`std::print!`]. Panics if the original destination or an
/// active sink fails the write, after every destination was attempted.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::console::_print_to($crate::console::stdout(), ::std::format_args!($($arg)*))
    };
}

/// Prints a line to standard output through the intercepting router.
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::console::_print_to(
            $crate::console::stdout(),
            ::std::format_args!("{}\n", ::std::format_args!($($arg)*)),
        )
    };
}

/// Prints to standard error through the intercepting router.
#[macro_export]
macro_rules! eprint {
    ($($arg:tt)*) => {
        $crate::console::_print_to($crate::console::stderr(), ::std::format_args!($($arg)*))
    };
}

/// Prints a line to standard error through the intercepting router.
#[macro_export]
macro_rules! eprintln {
    () => {
        $crate::eprint!("\n")
    };
    ($($arg:tt)*) => {
        $crate::console::_print_to(
            $crate::console::stderr(),
            ::std::format_args!("{}\n", ::std::format_args!($($arg)*)),
        )
    };
}
