//! Core listing record, draft builder and expiry classification

use crate::actor::{Actor, ActorId};
use crate::error::DomainError;
use chrono::{DateTime, TimeZone, Utc};

/// Listings must offer more than this many meals.
pub const MIN_MEALS: u32 = 10;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    /// The same instant shifted by a whole number of hours. Handy for
    /// expressing "two hours from now" expiration dates.
    pub fn offset_hours(&self, hours: i64) -> Self {
        Self(self.0 + chrono::Duration::hours(hours))
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Which open pool an unclaimed listing currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    /// Not yet expired; offered to organizations for redistribution.
    Donation,
    /// Expired; offered to composters.
    Compost,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    #[n(0)]
    pub id: String, // 15 character generated identifier
    #[n(1)]
    pub restaurant: ActorId, // origin, immutable
    #[n(2)]
    pub organization: Option<ActorId>, // set exactly once, by the claim engine
    #[n(3)]
    pub composter: Option<ActorId>,
    #[n(4)]
    pub expiration_date: TimeStamp<Utc>,
    #[n(5)]
    pub meals: u32,
    #[n(6)]
    pub dairy: bool,
    #[n(7)]
    pub allergens: Option<String>,
    #[n(8)]
    pub veg: bool,
    #[n(9)]
    pub pickup: String,
    #[n(10)]
    pub claimed: bool,
    #[n(11)]
    pub claimed_at: Option<TimeStamp<Utc>>,
}

impl Listing {
    /// Expiry is always computed at read time, never stored.
    pub fn is_expired(&self, now: &TimeStamp<Utc>) -> bool {
        now.to_datetime_utc() >= self.expiration_date.to_datetime_utc()
    }

    /// Pool membership at the given instant. A claimed listing belongs to
    /// neither pool; an unclaimed one belongs to exactly one, migrating from
    /// donation to compost at its expiration instant and never back.
    pub fn pool_at(&self, now: &TimeStamp<Utc>) -> Option<Pool> {
        if self.claimed {
            return None;
        }
        if self.is_expired(now) {
            Some(Pool::Compost)
        } else {
            Some(Pool::Donation)
        }
    }
}

// Used for constructing listing drafts before they are persisted
#[derive(Debug, Default, Clone)]
pub struct ListingDraft {
    expiration_date: Option<TimeStamp<Utc>>,
    meals: u32,
    dairy: Option<bool>,
    allergens: Option<String>,
    veg: Option<bool>,
    pickup: Option<String>,
}

impl ListingDraft {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_expiration_date(mut self, date: TimeStamp<Utc>) -> Self {
        self.expiration_date = Some(date);
        self
    }
    pub fn set_meals(mut self, meals: u32) -> Self {
        self.meals = meals;
        self
    }
    pub fn set_dairy(mut self, dairy: bool) -> Self {
        self.dairy = Some(dairy);
        self
    }
    pub fn set_allergens(mut self, allergens: &str) -> Self {
        self.allergens = Some(allergens.to_string());
        self
    }
    pub fn set_veg(mut self, veg: bool) -> Self {
        self.veg = Some(veg);
        self
    }
    pub fn set_pickup(mut self, pickup: &str) -> Self {
        self.pickup = Some(pickup.to_string());
        self
    }

    // Checks fields and performs validation, then stamps an open listing
    // owned by the given restaurant. Pickup defaults to the restaurant's
    // registered address.
    pub fn build(self, id: String, restaurant: &Actor) -> Result<Listing, DomainError> {
        let Some(expiration_date) = self.expiration_date else {
            return Err(DomainError::ValidationFailed(
                "expiration date is not set".into(),
            ));
        };
        if self.meals <= MIN_MEALS {
            return Err(DomainError::ValidationFailed(format!(
                "meals must be greater than {MIN_MEALS}"
            )));
        }
        let Some(dairy) = self.dairy else {
            return Err(DomainError::ValidationFailed("dairy is not set".into()));
        };
        let Some(veg) = self.veg else {
            return Err(DomainError::ValidationFailed("veg is not set".into()));
        };

        let pickup = self.pickup.unwrap_or_else(|| restaurant.address.clone());

        Ok(Listing {
            id,
            restaurant: restaurant.id.clone(),
            organization: None,
            composter: None,
            expiration_date,
            meals: self.meals,
            dairy,
            allergens: self.allergens,
            veg,
            pickup,
            claimed: false,
            claimed_at: None,
        })
    }
}
