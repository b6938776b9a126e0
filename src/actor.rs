//! Actor records and the per-kind capability set

use crate::listing::Pool;
use uuid7::{Uuid, uuid7};

// newtype wrapper over uuid because Uuid doesn't implement minicbor traits.
// The id is the stable key for an actor; email is just a mutable attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(uuid7())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<C> minicbor::Encode<C> for ActorId {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        self.0.as_bytes().encode(e, ctx)
    }
}

impl<'b, C> minicbor::Decode<'b, C> for ActorId {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let digest: [u8; 16] = d.decode()?;

        Ok(ActorId(Uuid::from(digest)))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    #[n(0)]
    Restaurant,
    #[n(1)]
    Organization,
    #[n(2)]
    Composter,
}

impl ActorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActorKind::Restaurant => "restaurant",
            ActorKind::Organization => "organization",
            ActorKind::Composter => "composter",
        }
    }

    /// Restaurants and composters handle food directly and must hold a
    /// currently valid food-safety licence.
    pub fn requires_licence(&self) -> bool {
        matches!(self, ActorKind::Restaurant | ActorKind::Composter)
    }

    pub fn can_list(&self) -> bool {
        matches!(self, ActorKind::Restaurant)
    }

    // Composters are not gated on expiry: they may take a listing off an
    // unexpired pool as well. Observed behavior, kept as-is.
    pub fn can_claim_before_expiry(&self) -> bool {
        matches!(self, ActorKind::Organization | ActorKind::Composter)
    }

    pub fn can_claim_after_expiry(&self) -> bool {
        matches!(self, ActorKind::Composter)
    }

    /// Which open pool this kind is offered when browsing listings.
    pub fn visible_pool(&self) -> Option<Pool> {
        match self {
            ActorKind::Restaurant => None,
            ActorKind::Organization => Some(Pool::Donation),
            ActorKind::Composter => Some(Pool::Compost),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    #[n(0)]
    pub id: ActorId,
    #[n(1)]
    pub kind: ActorKind,
    #[n(2)]
    pub email: String,
    #[n(3)]
    pub name: String,
    #[n(4)]
    pub contact_number: String,
    #[n(5)]
    pub address: String,
    #[n(6)]
    pub licence_key: Option<String>,
    #[n(7)]
    pub credential_hash: String, // opaque, produced by a CredentialScheme
}

/// Contact details supplied at registration.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub contact_number: String,
    pub address: String,
}

/// Partial update applied to an existing actor. Unset fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub licence_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_id_encoding() {
        let original = ActorId::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: ActorId = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn capability_set_per_kind() {
        assert!(ActorKind::Restaurant.requires_licence());
        assert!(ActorKind::Composter.requires_licence());
        assert!(!ActorKind::Organization.requires_licence());

        assert!(ActorKind::Restaurant.can_list());
        assert!(!ActorKind::Organization.can_list());

        assert!(ActorKind::Organization.can_claim_before_expiry());
        assert!(!ActorKind::Organization.can_claim_after_expiry());
        assert!(ActorKind::Composter.can_claim_before_expiry());
        assert!(ActorKind::Composter.can_claim_after_expiry());
        assert!(!ActorKind::Restaurant.can_claim_before_expiry());

        assert_eq!(ActorKind::Organization.visible_pool(), Some(Pool::Donation));
        assert_eq!(ActorKind::Composter.visible_pool(), Some(Pool::Compost));
        assert_eq!(ActorKind::Restaurant.visible_pool(), None);
    }
}
