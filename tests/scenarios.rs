use mealdrop::{
    actor::{ActorKind, Profile, ProfileUpdate},
    credentials::DigestCredentials,
    directory::ActorDirectory,
    error::DomainError,
    licence::LicenceGate,
    listing::{ListingDraft, TimeStamp},
    service::ListingService,
};
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

const LICENCE: &str = "12345678901234";

// Sled uses file-based locking to prevent concurrent access, so only one test
// can hold the lock at a time. As is good practice in testing create separate
// databases for each test. The db is created on temp for simplified cleanup.
fn setup(db_name: &str) -> anyhow::Result<(TempDir, LicenceGate, ActorDirectory, ListingService)> {
    let temp_dir = tempdir()?;
    let db = sled::open(temp_dir.path().join(db_name))?;
    let db = Arc::new(db);

    // reset the db for each test run
    db.clear()?;

    let gate = LicenceGate::new(db.clone());
    let directory = ActorDirectory::new(db.clone(), gate.clone(), Arc::new(DigestCredentials));
    let service = ListingService::new(db, directory.clone());

    Ok((temp_dir, gate, directory, service))
}

fn profile(name: &str) -> Profile {
    Profile {
        name: name.to_string(),
        contact_number: "0123456789".to_string(),
        address: format!("{name} street"),
    }
}

#[test]
fn donate_and_claim_flow() -> anyhow::Result<()> {
    let (_guard, gate, directory, service) = setup("donate_and_claim.db")?;

    gate.grant(LICENCE)?;
    directory.register(
        ActorKind::Restaurant,
        "r@x.com",
        "secret-pw",
        profile("Trattoria"),
        Some(LICENCE),
    )?;
    directory.register(
        ActorKind::Organization,
        "org@x.com",
        "secret-pw",
        profile("Food Bank"),
        None,
    )?;

    let now = TimeStamp::new();
    let listing = service.create_listing(
        ActorKind::Restaurant,
        "r@x.com",
        ListingDraft::new()
            .set_expiration_date(now.offset_hours(2))
            .set_meals(20)
            .set_dairy(false)
            .set_veg(true)
            .set_allergens("peanuts"),
    )?;
    assert_eq!(listing.id.len(), 15);
    assert!(!listing.claimed);

    // one hour in, the listing is offered to organizations but not composters
    let query = now.offset_hours(1);
    let donation_pool = service.open_pool(ActorKind::Organization, &query)?;
    assert!(donation_pool.iter().any(|l| l.id == listing.id));
    assert!(service.open_pool(ActorKind::Composter, &query)?.is_empty());

    let claimed = service.claim(
        &listing.id,
        ActorKind::Organization,
        "org@x.com",
        query.clone(),
    )?;
    assert!(claimed.claimed);
    assert!(claimed.claimed_at.is_some());
    assert!(claimed.organization.is_some());

    // gone from both open pools
    assert!(service.open_pool(ActorKind::Organization, &query)?.is_empty());
    assert!(service.open_pool(ActorKind::Composter, &query)?.is_empty());

    // visible in the claimant's and the restaurant's claimed lists
    let by_org = service.claimed_by(ActorKind::Organization, "org@x.com")?;
    assert_eq!(by_org.len(), 1);
    assert_eq!(by_org[0].id, listing.id);

    let by_rest = service.claimed_by(ActorKind::Restaurant, "r@x.com")?;
    assert_eq!(by_rest.len(), 1);
    assert_eq!(by_rest[0].id, listing.id);

    Ok(())
}

#[test]
fn expired_listing_moves_to_compost_pool() -> anyhow::Result<()> {
    let (_guard, gate, directory, service) = setup("expiry_migration.db")?;

    gate.grant(LICENCE)?;
    directory.register(
        ActorKind::Restaurant,
        "r@x.com",
        "secret-pw",
        profile("Trattoria"),
        Some(LICENCE),
    )?;
    directory.register(
        ActorKind::Composter,
        "comp@x.com",
        "secret-pw",
        profile("City Compost"),
        Some(LICENCE),
    )?;

    let now = TimeStamp::new();
    let listing = service.create_listing(
        ActorKind::Restaurant,
        "r@x.com",
        ListingDraft::new()
            .set_expiration_date(now.offset_hours(1))
            .set_meals(30)
            .set_dairy(true)
            .set_veg(false),
    )?;

    // unexpired: organization pool only
    assert!(service.open_pool(ActorKind::Composter, &now)?.is_empty());

    // two hours later the unclaimed listing has migrated to the compost pool
    let later = now.offset_hours(2);
    assert!(service.open_pool(ActorKind::Organization, &later)?.is_empty());
    let compost_pool = service.open_pool(ActorKind::Composter, &later)?;
    assert!(compost_pool.iter().any(|l| l.id == listing.id));

    let claimed = service.claim(&listing.id, ActorKind::Composter, "comp@x.com", later)?;
    assert!(claimed.composter.is_some());
    assert!(claimed.organization.is_none());

    Ok(())
}

// Composters are not gated on expiry, so an unexpired listing can be taken
// off the donation pool by a composter. Observed behavior, kept as-is.
#[test]
fn composter_can_claim_before_expiry() -> anyhow::Result<()> {
    let (_guard, gate, directory, service) = setup("composter_early_claim.db")?;

    gate.grant(LICENCE)?;
    directory.register(
        ActorKind::Restaurant,
        "r@x.com",
        "secret-pw",
        profile("Trattoria"),
        Some(LICENCE),
    )?;
    directory.register(
        ActorKind::Composter,
        "comp@x.com",
        "secret-pw",
        profile("City Compost"),
        Some(LICENCE),
    )?;

    let now = TimeStamp::new();
    let listing = service.create_listing(
        ActorKind::Restaurant,
        "r@x.com",
        ListingDraft::new()
            .set_expiration_date(now.offset_hours(2))
            .set_meals(15)
            .set_dairy(false)
            .set_veg(true),
    )?;

    let claimed = service.claim(&listing.id, ActorKind::Composter, "comp@x.com", now)?;
    assert!(claimed.composter.is_some());

    Ok(())
}

#[test]
fn organization_cannot_claim_expired_listing() -> anyhow::Result<()> {
    let (_guard, gate, directory, service) = setup("org_expired_claim.db")?;

    gate.grant(LICENCE)?;
    directory.register(
        ActorKind::Restaurant,
        "r@x.com",
        "secret-pw",
        profile("Trattoria"),
        Some(LICENCE),
    )?;
    directory.register(
        ActorKind::Organization,
        "org@x.com",
        "secret-pw",
        profile("Food Bank"),
        None,
    )?;

    let now = TimeStamp::new();
    let listing = service.create_listing(
        ActorKind::Restaurant,
        "r@x.com",
        ListingDraft::new()
            .set_expiration_date(now.offset_hours(1))
            .set_meals(15)
            .set_dairy(false)
            .set_veg(true),
    )?;

    let err = service
        .claim(
            &listing.id,
            ActorKind::Organization,
            "org@x.com",
            now.offset_hours(3),
        )
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));

    // still unclaimed and available to composters
    let stored = service.listing(&listing.id)?;
    assert!(!stored.claimed);

    Ok(())
}

#[test]
fn unknown_licence_rejected_without_creating_an_actor() -> anyhow::Result<()> {
    let (_guard, _gate, directory, _service) = setup("unknown_licence.db")?;

    // nothing granted, so any key is invalid
    let err = directory
        .register(
            ActorKind::Composter,
            "comp@x.com",
            "secret-pw",
            profile("City Compost"),
            Some("99999999999999"),
        )
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidLicence));

    let err = directory
        .lookup(ActorKind::Composter, "comp@x.com")
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));

    Ok(())
}

#[test]
fn licence_revocation_blocks_next_login() -> anyhow::Result<()> {
    let (_guard, gate, directory, _service) = setup("licence_revocation.db")?;

    gate.grant(LICENCE)?;
    directory.register(
        ActorKind::Restaurant,
        "r@x.com",
        "secret-pw",
        profile("Trattoria"),
        Some(LICENCE),
    )?;

    directory.authenticate(ActorKind::Restaurant, "r@x.com", "secret-pw")?;

    gate.revoke(LICENCE)?;

    let err = directory
        .authenticate(ActorKind::Restaurant, "r@x.com", "secret-pw")
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidLicence));

    Ok(())
}

#[test]
fn identity_update_moves_listings_to_the_new_email() -> anyhow::Result<()> {
    let (_guard, gate, directory, service) = setup("identity_cascade.db")?;

    gate.grant(LICENCE)?;
    directory.register(
        ActorKind::Restaurant,
        "old@x.com",
        "secret-pw",
        profile("Trattoria"),
        Some(LICENCE),
    )?;

    let now = TimeStamp::new();
    for _ in 0..2 {
        service.create_listing(
            ActorKind::Restaurant,
            "old@x.com",
            ListingDraft::new()
                .set_expiration_date(now.offset_hours(2))
                .set_meals(15)
                .set_dairy(false)
                .set_veg(true),
        )?;
    }

    directory.update_identity(
        ActorKind::Restaurant,
        "old@x.com",
        ProfileUpdate {
            email: Some("new@x.com".to_string()),
            ..Default::default()
        },
    )?;

    // every listing is reachable under the new email, none under the old
    assert_eq!(service.listed_by("new@x.com")?.len(), 2);
    assert!(matches!(
        service.listed_by("old@x.com"),
        Err(DomainError::NotFound(_))
    ));

    Ok(())
}

// Deregistering a restaurant leaves its listings in place. Orphaned listings
// remain claimable; see DESIGN.md for the policy decision.
#[test]
fn deregistration_keeps_existing_listings() -> anyhow::Result<()> {
    let (_guard, gate, directory, service) = setup("deregister_listings.db")?;

    gate.grant(LICENCE)?;
    directory.register(
        ActorKind::Restaurant,
        "r@x.com",
        "secret-pw",
        profile("Trattoria"),
        Some(LICENCE),
    )?;

    let now = TimeStamp::new();
    let listing = service.create_listing(
        ActorKind::Restaurant,
        "r@x.com",
        ListingDraft::new()
            .set_expiration_date(now.offset_hours(2))
            .set_meals(15)
            .set_dairy(false)
            .set_veg(true),
    )?;

    directory.deregister(ActorKind::Restaurant, "r@x.com", "secret-pw")?;

    assert!(matches!(
        directory.lookup(ActorKind::Restaurant, "r@x.com"),
        Err(DomainError::NotFound(_))
    ));
    // the listing survives its owner
    assert_eq!(service.listing(&listing.id)?.id, listing.id);

    Ok(())
}
