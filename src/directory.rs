//! Actor registration, authentication and identity management
use crate::actor::{Actor, ActorId, ActorKind, Profile, ProfileUpdate};
use crate::credentials::CredentialScheme;
use crate::error::DomainError;
use crate::licence::LicenceGate;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Batch, Db};
use std::sync::Arc;
use tracing::{info, warn};

fn actor_key(id: &ActorId) -> String {
    format!("actor/{id}")
}

fn email_key(email: &str) -> String {
    format!("email/{email}")
}

fn not_found(kind: ActorKind, email: &str) -> DomainError {
    DomainError::NotFound(format!("{} {email}", kind.label()))
}

// Secondary index entry: email -> owning actor. One entry per email across
// all kinds, which is what makes emails globally unique.
#[derive(minicbor::Encode, minicbor::Decode, Debug)]
struct EmailEntry {
    #[n(0)]
    kind: ActorKind,
    #[n(1)]
    actor: ActorId,
}

#[derive(Clone)]
pub struct ActorDirectory {
    instance: Arc<Db>,
    gate: LicenceGate,
    credentials: Arc<dyn CredentialScheme>,
}

impl ActorDirectory {
    pub fn new(instance: Arc<Db>, gate: LicenceGate, credentials: Arc<dyn CredentialScheme>) -> Self {
        Self {
            instance,
            gate,
            credentials,
        }
    }

    /// Register a new actor. Fails with `AlreadyRegistered` if any actor of
    /// any kind already holds the email, and with `InvalidLicence` if the
    /// kind requires a food-safety licence that is not in the valid set.
    pub fn register(
        &self,
        kind: ActorKind,
        email: &str,
        password: &str,
        profile: Profile,
        licence_key: Option<&str>,
    ) -> Result<Actor, DomainError> {
        let licence_key = if kind.requires_licence() {
            let Some(key) = licence_key else {
                return Err(DomainError::ValidationFailed(format!(
                    "a {} must present a licence key",
                    kind.label()
                )));
            };
            if !self.gate.is_valid(key)? {
                return Err(DomainError::InvalidLicence);
            }
            Some(key.to_string())
        } else {
            None
        };

        let actor = Actor {
            id: ActorId::new(),
            kind,
            email: email.to_string(),
            name: profile.name,
            contact_number: profile.contact_number,
            address: profile.address,
            licence_key,
            credential_hash: self.credentials.hash(password),
        };

        // index entry and actor record are written in one transaction; a
        // concurrent register for the same email observes AlreadyRegistered,
        // and no failure can leave the email reserved without a record
        let entry = EmailEntry {
            kind,
            actor: actor.id.clone(),
        };
        let entry_cbor = minicbor::to_vec(&entry)?;
        let actor_cbor = minicbor::to_vec(&actor)?;
        let ekey = email_key(email);
        let akey = actor_key(&actor.id);

        let outcome = self.instance.transaction(|tx| {
            if tx.get(ekey.as_bytes())?.is_some() {
                return Err(ConflictableTransactionError::Abort(
                    DomainError::AlreadyRegistered,
                ));
            }
            tx.insert(ekey.as_bytes(), entry_cbor.clone())?;
            tx.insert(akey.as_bytes(), actor_cbor.clone())?;
            Ok(())
        });
        match outcome {
            Ok(()) => {}
            Err(TransactionError::Abort(err)) => return Err(err),
            Err(TransactionError::Storage(err)) => return Err(err.into()),
        }

        info!("registered {} {email}", kind.label());
        Ok(actor)
    }

    /// Resolve an email to the actor record for the given kind.
    pub fn lookup(&self, kind: ActorKind, email: &str) -> Result<Actor, DomainError> {
        let Some(raw) = self.instance.get(email_key(email))? else {
            return Err(not_found(kind, email));
        };
        let entry: EmailEntry = minicbor::decode(raw.as_ref())?;
        if entry.kind != kind {
            return Err(not_found(kind, email));
        }

        let Some(raw) = self.instance.get(actor_key(&entry.actor))? else {
            // index entry without a record; treat as absent
            return Err(not_found(kind, email));
        };
        Ok(minicbor::decode(raw.as_ref())?)
    }

    /// Verify credentials, and for licence-bearing kinds re-check the
    /// on-file licence against the valid set. Revocation takes effect here,
    /// on the next login, not only at registration.
    pub fn authenticate(
        &self,
        kind: ActorKind,
        email: &str,
        password: &str,
    ) -> Result<Actor, DomainError> {
        let actor = self.lookup(kind, email)?;

        if !self.credentials.verify(password, &actor.credential_hash) {
            return Err(DomainError::InvalidCredential);
        }

        if kind.requires_licence() {
            let valid = match actor.licence_key.as_deref() {
                Some(key) => self.gate.is_valid(key)?,
                None => false,
            };
            if !valid {
                warn!("rejected login for {} {email}: licence revoked", kind.label());
                return Err(DomainError::InvalidLicence);
            }
        }

        Ok(actor)
    }

    /// Remove an actor after a successful credential check. Listings the
    /// actor originated or claimed are left in place. The licence is not
    /// re-checked here: an actor with a revoked licence can still remove
    /// itself.
    pub fn deregister(
        &self,
        kind: ActorKind,
        email: &str,
        password: &str,
    ) -> Result<(), DomainError> {
        let actor = self.lookup(kind, email)?;
        if !self.credentials.verify(password, &actor.credential_hash) {
            return Err(DomainError::InvalidCredential);
        }

        let mut batch = Batch::default();
        batch.remove(actor_key(&actor.id).as_bytes());
        batch.remove(email_key(email).as_bytes());
        self.instance.apply_batch(batch)?;

        info!("deregistered {} {email}", kind.label());
        Ok(())
    }

    /// Apply a partial profile update, moving the email index entry when the
    /// email changes. Listings reference the stable actor id, so an email
    /// change never rewrites listings.
    pub fn update_identity(
        &self,
        kind: ActorKind,
        existing_email: &str,
        update: ProfileUpdate,
    ) -> Result<Actor, DomainError> {
        let mut actor = self.lookup(kind, existing_email)?;

        if let Some(name) = update.name {
            actor.name = name;
        }
        if let Some(contact_number) = update.contact_number {
            actor.contact_number = contact_number;
        }
        if let Some(address) = update.address {
            actor.address = address;
        }
        if let Some(licence_key) = update.licence_key {
            // not re-validated here; a revoked key is caught at next login
            actor.licence_key = Some(licence_key);
        }

        match update.email {
            Some(new_email) if new_email != actor.email => {
                // reserve the new email, then write the record and drop the
                // old index entry in one atomic batch
                let entry = EmailEntry {
                    kind,
                    actor: actor.id.clone(),
                };
                if self
                    .instance
                    .compare_and_swap(
                        email_key(&new_email),
                        None::<&[u8]>,
                        Some(minicbor::to_vec(&entry)?),
                    )?
                    .is_err()
                {
                    return Err(DomainError::AlreadyRegistered);
                }

                let old_email = std::mem::replace(&mut actor.email, new_email);

                let mut batch = Batch::default();
                batch.insert(actor_key(&actor.id).as_bytes(), minicbor::to_vec(&actor)?);
                batch.remove(email_key(&old_email).as_bytes());
                self.instance.apply_batch(batch)?;
            }
            _ => {
                self.instance
                    .insert(actor_key(&actor.id), minicbor::to_vec(&actor)?)?;
            }
        }

        info!("updated {} {}", kind.label(), actor.email);
        Ok(actor)
    }
}
