//! Application entity addressing: pairing a network address with the AE
//! title expected (or offered) at that address.

use std::fmt;

/// A network address paired with the AE title of the node found there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AeAddr<A> {
    address: A,
    ae_title: String,
}

impl<A> AeAddr<A> {
    pub fn new(address: A, ae_title: impl Into<String>) -> Self {
        AeAddr {
            address,
            ae_title: ae_title.into(),
        }
    }

    pub fn address(&self) -> &A {
        &self.address
    }

    pub fn ae_title(&self) -> &str {
        &self.ae_title
    }

    pub fn into_parts(self) -> (A, String) {
        (self.address, self.ae_title)
    }
}

impl<A: fmt::Display> fmt::Display for AeAddr<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.ae_title, self.address)
    }
}

/// An [`AeAddr`] that also knows the calling AE title this node should
/// present when it initiates the connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FullAeAddr<A> {
    address: A,
    called_ae_title: String,
    calling_ae_title: String,
}

impl<A> FullAeAddr<A> {
    pub fn new(
        address: A,
        called_ae_title: impl Into<String>,
        calling_ae_title: impl Into<String>,
    ) -> Self {
        FullAeAddr {
            address,
            called_ae_title: called_ae_title.into(),
            calling_ae_title: calling_ae_title.into(),
        }
    }

    pub fn address(&self) -> &A {
        &self.address
    }

    pub fn called_ae_title(&self) -> &str {
        &self.called_ae_title
    }

    pub fn calling_ae_title(&self) -> &str {
        &self.calling_ae_title
    }
}
