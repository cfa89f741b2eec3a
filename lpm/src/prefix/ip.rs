// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::fmt::{Debug, Display};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::prefix::PrefixError;
use ipnet::{Ipv4Net, Ipv6Net};
use num_traits::{CheckedShr, One, PrimInt, Unsigned, Zero};
use serde::{Deserialize, Serialize};

pub trait Representable {
    type Repr: Unsigned + PrimInt + Zero + CheckedShr;

    fn to_bits(&self) -> Self::Repr;
    fn from_bits(repr: Self::Repr) -> Self;
}

impl Representable for Ipv4Addr {
    type Repr = u32;

    fn to_bits(&self) -> Self::Repr {
        Ipv4Addr::to_bits(*self)
    }

    fn from_bits(repr: Self::Repr) -> Self {
        Ipv4Addr::from_bits(repr)
    }
}

impl Representable for Ipv6Addr {
    type Repr = u128;

    fn to_bits(&self) -> Self::Repr {
        Ipv6Addr::to_bits(*self)
    }

    fn from_bits(repr: Self::Repr) -> Self {
        Ipv6Addr::from_bits(repr)
    }
}

/// Network mask of `len` bits, for an address family of `max_len` bits.
fn netmask<R: PrimInt>(max_len: u8, len: u8) -> R {
    if len == 0 {
        R::zero()
    } else {
        R::max_value().unsigned_shl(u32::from(max_len - len.min(max_len)))
    }
}

/// An address family, seen through the prefixes it is made of.
#[allow(clippy::len_without_is_empty)]
pub trait IpPrefix: Debug + Display + Copy + From<Self::Addr> + PartialEq + Eq {
    type Repr: Debug + Unsigned + PrimInt + Zero + CheckedShr;
    type Addr: Display + Debug + Copy + Eq + Representable<Repr = Self::Repr>;
    const MAX_LEN: u8;

    const ROOT: Self;

    /// # Errors
    ///
    /// Returns an error if the length is greater than `Self::MAX_LEN`, or if the address has host
    /// bits set.
    fn new(addr: Self::Addr, len: u8) -> Result<Self, PrefixError>;

    /// Builds the prefix of length `len` that covers `addr`, zeroing all bits of `addr` past `len`.
    /// Lengths greater than `Self::MAX_LEN` are clamped to a host prefix.
    fn truncate(addr: Self::Addr, len: u8) -> Self;

    fn network(&self) -> Self::Addr;

    fn last_address(&self) -> Self::Addr;

    fn len(&self) -> u8;

    /// Tell whether bit number `bit` of `addr` is set. Bits are numbered from the most significant
    /// one, so that bit `n` is the one that a prefix of length `n` does not cover yet.
    #[must_use]
    fn addr_bit(addr: &Self::Addr, bit: u8) -> bool {
        if bit >= Self::MAX_LEN {
            return false;
        }
        let one = Self::Repr::one();
        addr.to_bits().unsigned_shr(u32::from(Self::MAX_LEN - 1 - bit)) & one == one
    }
}

pub trait IpPrefixCovering<Other> {
    fn covers(&self, other: &Other) -> bool;
}

fn parse_prefix<P: IpPrefix>(s: &str) -> Result<P, PrefixError>
where
    P::Addr: FromStr,
{
    let invalid = || PrefixError::Invalid(s.to_owned());
    let (addr, len) = s.split_once('/').ok_or_else(invalid)?;
    let addr = addr.parse::<P::Addr>().map_err(|_| invalid())?;
    let len = len.parse::<u8>().map_err(|_| invalid())?;
    P::new(addr, len)
}

/// Defines the prefix type of an address family, as a canonical (no host bits) wrapper around
/// the matching `ipnet` type.
macro_rules! family_prefix {
    ($(#[$attr:meta])* $name:ident($net:ident = $net_name:literal, $addr:ident, $repr:ty, $max_len:literal)) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(from = $net_name, into = $net_name)]
        #[repr(transparent)]
        pub struct $name($net);

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{self}")
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::ROOT
            }
        }

        impl IpPrefix for $name {
            type Repr = $repr;
            type Addr = $addr;
            const MAX_LEN: u8 = $max_len;

            const ROOT: Self = match $net::new($addr::UNSPECIFIED, 0) {
                Ok(root) => Self(root),
                Err(_) => panic!("zero-length prefix is always valid"),
            };

            fn new(addr: $addr, len: u8) -> Result<Self, PrefixError> {
                if len > Self::MAX_LEN {
                    return Err(PrefixError::InvalidLength(len));
                }
                let prefix = Self::truncate(addr, len);
                if prefix.network() != addr {
                    return Err(PrefixError::Invalid(format!(
                        "{addr}/{len} has host bits set (did you mean {prefix}?)"
                    )));
                }
                Ok(prefix)
            }

            fn truncate(addr: $addr, len: u8) -> Self {
                let len = len.min(Self::MAX_LEN);
                let mask = netmask::<$repr>(Self::MAX_LEN, len);
                Self($net::new_assert($addr::from_bits(addr.to_bits() & mask), len))
            }

            fn network(&self) -> $addr {
                self.0.network()
            }

            fn last_address(&self) -> $addr {
                self.0.broadcast()
            }

            fn len(&self) -> u8 {
                self.0.prefix_len()
            }
        }

        impl IpPrefixCovering<$addr> for $name {
            fn covers(&self, other: &$addr) -> bool {
                self.0.contains(other)
            }
        }

        impl IpPrefixCovering<$name> for $name {
            fn covers(&self, other: &$name) -> bool {
                self.0.contains(&other.0)
            }
        }

        /// Host prefix
        impl From<$addr> for $name {
            fn from(addr: $addr) -> Self {
                Self($net::from(addr))
            }
        }

        /// Host bits of the network are dropped.
        impl From<$net> for $name {
            fn from(net: $net) -> Self {
                Self::truncate(net.addr(), net.prefix_len())
            }
        }

        impl From<$name> for $net {
            fn from(prefix: $name) -> Self {
                prefix.0
            }
        }

        impl FromStr for $name {
            type Err = PrefixError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_prefix(s)
            }
        }
    };
}

family_prefix!(
    /// An IPv4 prefix
    Ipv4Prefix(Ipv4Net = "Ipv4Net", Ipv4Addr, u32, 32)
);

family_prefix!(
    /// An IPv6 prefix
    Ipv6Prefix(Ipv6Net = "Ipv6Net", Ipv6Addr, u128, 128)
);

#[cfg(any(test, feature = "testing"))]
mod contract {
    use crate::prefix::{IpPrefix, Ipv4Prefix, Ipv6Prefix};
    use bolero::{Driver, TypeGenerator};
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::ops::Bound;

    impl TypeGenerator for Ipv4Prefix {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            let addr = Ipv4Addr::from_bits(driver.produce()?);
            let len = driver.gen_u8(Bound::Included(&0), Bound::Included(&Ipv4Prefix::MAX_LEN))?;
            Some(Ipv4Prefix::truncate(addr, len))
        }
    }

    impl TypeGenerator for Ipv6Prefix {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            let addr = Ipv6Addr::from_bits(driver.produce()?);
            let len = driver.gen_u8(Bound::Included(&0), Bound::Included(&Ipv6Prefix::MAX_LEN))?;
            Some(Ipv6Prefix::truncate(addr, len))
        }
    }
}
