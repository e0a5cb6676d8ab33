type TtlInnerType = u8;

#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Ttl(pub TtlInnerType);

impl Ttl {
    pub(crate) fn start_value() -> Ttl {
        Ttl(1)
    }

    #[must_use]
    pub fn next(self) -> Option<Ttl> {
        self.0.checked_add(1).map(Ttl)
    }
}

impl From<TtlInnerType> for Ttl {
    fn from(integer: TtlInnerType) -> Self {
        Ttl(integer)
    }
}

impl From<Ttl> for TtlInnerType {
    fn from(ttl: Ttl) -> Self {
        ttl.0
    }
}

impl std::fmt::Display for Ttl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
