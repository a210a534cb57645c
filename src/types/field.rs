//! Little-endian field extraction from fixed-layout payloads

use crate::{LinkError, Result};

/// Trait for integer types read at a fixed offset from a little-endian payload.
pub trait LeField: Sized {
    /// Width of the field in bytes.
    const WIDTH: usize;

    /// Read this type from `data` at `offset`.
    fn read(data: &[u8], offset: usize) -> Result<Self>;
}

macro_rules! le_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl LeField for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn read(data: &[u8], offset: usize) -> Result<Self> {
                    let bytes = offset
                        .checked_add(Self::WIDTH)
                        .and_then(|end| data.get(offset..end))
                        .ok_or_else(|| LinkError::parse_error(
                            "Field extraction",
                            format!(
                                "{} at offset {} overruns {}-byte payload",
                                stringify!($ty),
                                offset,
                                data.len()
                            ),
                        ))?;

                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    Ok(<$ty>::from_le_bytes(raw))
                }
            }
        )*
    };
}

le_field!(u8, i8, u16, i16, u32, i32);

/// Read a field of type `T` at `offset`.
#[inline]
pub fn read<T: LeField>(data: &[u8], offset: usize) -> Result<T> {
    T::read(data, offset)
}
