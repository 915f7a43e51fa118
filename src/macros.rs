//! Convenience macros for KNX addresses.

/// Create a [`GroupAddress`](crate::addressing::GroupAddress) from 3-level
/// notation, validated at compile time.
///
/// # Examples
///
/// ```
/// use knx_tunnel::ga;
///
/// let addr = ga!(1/2/3);
/// assert_eq!(u16::from(addr), 0x0A03);
/// ```
///
/// Out-of-range components fail the build:
///
/// ```compile_fail
/// use knx_tunnel::ga;
/// let addr = ga!(32/0/0);
/// ```
#[macro_export]
macro_rules! ga {
    ($main:literal / $middle:literal / $sub:literal) => {{
        const _: () = {
            if $main > 31 {
                panic!("main group must be 0-31");
            }
            if $middle > 7 {
                panic!("middle group must be 0-7");
            }
            if $sub > 255 {
                panic!("sub group must be 0-255");
            }
        };

        const RAW: u16 = (($main as u16 & 0x1F) << 11)
            | (($middle as u16 & 0x07) << 8)
            | ($sub as u16 & 0xFF);
        $crate::addressing::GroupAddress::from(RAW)
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn builds_raw_address() {
        let addr = ga!(1/2/3);
        assert_eq!(addr.main(), 1);
        assert_eq!(addr.middle(), 2);
        assert_eq!(addr.sub(), 3);

        assert_eq!(u16::from(ga!(31/7/255)), 65535);
        assert_eq!(u16::from(ga!(0/0/0)), 0);
    }
}
