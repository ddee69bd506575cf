//! Output helpers for experiment drivers.
//!
//! The macros here use `?` and so must be called from a function returning a
//! `Result` whose error type can absorb [`std::io::Error`] and
//! [`ndarray_npy::WriteNpzError`] (e.g. `anyhow::Result`).

pub use ndarray_npy::{ NpzReader, NpzWriter };

/// Call `println!` and immediately flush.
#[macro_export]
macro_rules! println_flush {
    ( $fmt:literal $(, $val:expr )* $(,)? ) => {
        println!($fmt $(, $val )*);
        std::io::Write::flush(&mut std::io::stdout()).ok();
    }
}

/// Call `eprint!` and immediately flush.
#[macro_export]
macro_rules! eprint_flush {
    ( $fmt:literal $(, $val:expr )* $(,)? ) => {
        eprint!($fmt $(, $val )*);
        std::io::Write::flush(&mut std::io::stderr()).ok();
    }
}

/// Create a directory and all its parents if they don't already exist.
#[macro_export]
macro_rules! mkdir {
    ( $dir:expr ) => {
        if !$dir.is_dir() {
            std::fs::create_dir_all(&$dir)?;
        }
    }
}

/// Write a series of named arrays to a `.npz` archive.
///
/// ```ignore
/// write_npz!(
///     outdir.join("data.npz"),
///     arrays: {
///         "time" => &time,
///         "expect" => &expect,
///     }
/// );
/// ```
#[macro_export]
macro_rules! write_npz {
    (
        $filename:expr,
        arrays: { $( $key:expr => $arr:expr ),* $(,)? } $(,)?
    ) => {
        {
            let mut npz = $crate::utils::NpzWriter::new(
                std::fs::File::create($filename)?);
            $(
                npz.add_array($key, $arr)?;
            )*
            npz.finish()?;
        }
    }
}
