//! Service layer API for listing and claim operations
use crate::actor::{ActorId, ActorKind};
use crate::directory::ActorDirectory;
use crate::error::DomainError;
use crate::listing::{Listing, ListingDraft, TimeStamp};
use crate::utils;
use chrono::Utc;
use sled::Db;
use std::sync::Arc;
use tracing::info;

const LISTING_PREFIX: &str = "listing/";

fn listing_key(id: &str) -> String {
    format!("{LISTING_PREFIX}{id}")
}

#[derive(Clone)]
pub struct ListingService {
    instance: Arc<Db>,
    directory: ActorDirectory,
}

impl ListingService {
    pub fn new(instance: Arc<Db>, directory: ActorDirectory) -> Self {
        Self {
            instance,
            directory,
        }
    }

    /// Create a new open listing for a donating actor.
    pub fn create_listing(
        &self,
        kind: ActorKind,
        email: &str,
        draft: ListingDraft,
    ) -> Result<Listing, DomainError> {
        if !kind.can_list() {
            return Err(DomainError::ValidationFailed(format!(
                "a {} cannot list meals",
                kind.label()
            )));
        }
        let restaurant = self.directory.lookup(kind, email)?;

        let listing = draft.build(utils::new_listing_id(), &restaurant)?;
        self.instance
            .insert(listing_key(&listing.id), minicbor::to_vec(&listing)?)?;

        info!("listed {} meals as {} for {email}", listing.meals, listing.id);
        Ok(listing)
    }

    /// The open pool offered to the given actor kind at the given instant:
    /// unexpired unclaimed listings for organizations, expired unclaimed
    /// ones for composters.
    pub fn open_pool(
        &self,
        kind: ActorKind,
        now: &TimeStamp<Utc>,
    ) -> Result<Vec<Listing>, DomainError> {
        let Some(pool) = kind.visible_pool() else {
            return Ok(vec![]);
        };
        self.scan_listings(|listing| listing.pool_at(now) == Some(pool))
    }

    /// Atomically transition a listing from open to claimed, binding the
    /// claimant. Exactly one of any number of concurrent claimants wins;
    /// every loser observes `AlreadyClaimed`.
    pub fn claim(
        &self,
        listing_id: &str,
        kind: ActorKind,
        email: &str,
        now: TimeStamp<Utc>,
    ) -> Result<Listing, DomainError> {
        if !kind.can_claim_before_expiry() && !kind.can_claim_after_expiry() {
            return Err(DomainError::ValidationFailed(format!(
                "a {} cannot claim listings",
                kind.label()
            )));
        }
        let claimant = self.directory.lookup(kind, email)?;

        let key = listing_key(listing_id);
        loop {
            let Some(current) = self.instance.get(&key)? else {
                return Err(DomainError::NotFound(format!("listing {listing_id}")));
            };
            let listing: Listing = minicbor::decode(current.as_ref())?;

            if listing.claimed {
                return Err(DomainError::AlreadyClaimed);
            }
            let eligible = if listing.is_expired(&now) {
                kind.can_claim_after_expiry()
            } else {
                kind.can_claim_before_expiry()
            };
            if !eligible {
                // the listing is no longer offered to this claimant's pool
                return Err(DomainError::NotFound(format!("listing {listing_id}")));
            }

            let updated = bind_claimant(listing, kind, claimant.id.clone(), now.clone());

            // single conditional write at the storage layer; a concurrent
            // claim changes the stored bytes and fails this swap
            match self
                .instance
                .compare_and_swap(&key, Some(current), Some(minicbor::to_vec(&updated)?))?
            {
                Ok(()) => {
                    info!("{} {email} claimed listing {listing_id}", kind.label());
                    return Ok(updated);
                }
                Err(_) => continue, // lost the race, reload and re-check
            }
        }
    }

    /// Listings where the actor is bound as claimant. For restaurants this
    /// is the set of listings they originated that are now claimed.
    pub fn claimed_by(&self, kind: ActorKind, email: &str) -> Result<Vec<Listing>, DomainError> {
        let actor = self.directory.lookup(kind, email)?;
        let id = Some(actor.id.clone());

        self.scan_listings(|listing| match kind {
            ActorKind::Restaurant => listing.restaurant == actor.id && listing.claimed,
            ActorKind::Organization => listing.organization == id,
            ActorKind::Composter => listing.composter == id,
        })
    }

    /// Every listing a restaurant has originated, claimed or not.
    pub fn listed_by(&self, email: &str) -> Result<Vec<Listing>, DomainError> {
        let restaurant = self.directory.lookup(ActorKind::Restaurant, email)?;

        self.scan_listings(|listing| listing.restaurant == restaurant.id)
    }

    /// Fetch a single listing by its identifier.
    pub fn listing(&self, listing_id: &str) -> Result<Listing, DomainError> {
        let Some(raw) = self.instance.get(listing_key(listing_id))? else {
            return Err(DomainError::NotFound(format!("listing {listing_id}")));
        };
        Ok(minicbor::decode(raw.as_ref())?)
    }

    fn scan_listings<F>(&self, mut keep: F) -> Result<Vec<Listing>, DomainError>
    where
        F: FnMut(&Listing) -> bool,
    {
        let mut listings = vec![];
        for item in self.instance.scan_prefix(LISTING_PREFIX) {
            let (_, raw) = item?;
            let listing: Listing = minicbor::decode(raw.as_ref())?;
            if keep(&listing) {
                listings.push(listing);
            }
        }
        Ok(listings)
    }
}

fn bind_claimant(
    mut listing: Listing,
    kind: ActorKind,
    claimant: ActorId,
    now: TimeStamp<Utc>,
) -> Listing {
    match kind {
        ActorKind::Organization => listing.organization = Some(claimant),
        ActorKind::Composter => listing.composter = Some(claimant),
        ActorKind::Restaurant => unreachable!("restaurants cannot claim"),
    }
    listing.claimed = true;
    listing.claimed_at = Some(now);
    listing
}
