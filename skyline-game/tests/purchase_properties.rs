use rand::rngs::mock::StepRng;
use skyline_game::{
    ActiveEffect, Catalog, DiscountSource, EffectKind, GameError, GameSession, Notification, Player, PlayerId,
    RngBundle, RoleId, SessionConfig, compute_effective_cost,
};

/// Every chance roll fails, so purchases have no drops or mini events.
fn quiet_session(coins: i64) -> GameSession {
    GameSession::new(
        Catalog::embedded().unwrap(),
        SessionConfig {
            starting_coins: coins,
            ..SessionConfig::default()
        },
    )
    .unwrap()
    .with_rng(RngBundle::uniform(StepRng::new(u64::MAX, 0)))
}

fn player_with_effects(role: RoleId, effects: &[(EffectKind, f64)]) -> Player {
    let mut player = Player::new(PlayerId::new("p"), "P", None, role, 10_000, 0, 0);
    player.active_effects = effects
        .iter()
        .enumerate()
        .map(|(idx, (kind, value))| ActiveEffect {
            effect_id: format!("effect-{idx}"),
            kind: *kind,
            value: *value,
            source: "test".into(),
        })
        .collect();
    player
}

#[test]
fn every_building_debits_its_cost_and_adds_one_copy() {
    let mut session = quiet_session(100_000);
    let id = session.join_player("Ada", None);
    session.assign_role(&id, RoleId::Lucky).unwrap();
    let buildings: Vec<String> = session
        .catalog()
        .buildings()
        .iter()
        .map(|b| b.id.clone())
        .collect();

    for building_id in &buildings {
        let before = session.player(&id).unwrap().clone();
        let receipt = session.buy_building(&id, building_id).unwrap();
        let rewards: i64 = receipt.achievements.iter().map(|a| a.reward.coins).sum();
        let after = session.player(&id).unwrap();
        assert_eq!(after.coins, before.coins - receipt.cost() + rewards, "{building_id}");
        assert_eq!(after.owned(building_id), before.owned(building_id) + 1);
        assert_eq!(receipt.cost(), receipt.building.cost);
    }
    assert!(session.city().is_consistent_with(session.players()));
}

#[test]
fn larger_item_discount_beats_role_and_is_consumed() {
    let catalog = Catalog::embedded().unwrap();
    let house = catalog.building("HOUSE").unwrap();
    let architect = catalog.role(RoleId::Architect);
    let player = player_with_effects(RoleId::Architect, &[(EffectKind::PurchaseDiscount, 0.5)]);

    let quote = compute_effective_cost(&player, house, architect, &mut StepRng::new(u64::MAX, 0));
    assert_eq!(quote.final_cost, 50);
    assert_eq!(quote.consumed_effects(), vec![0]);
}

#[test]
fn larger_role_discount_leaves_item_effect_pending() {
    let catalog = Catalog::embedded().unwrap();
    let house = catalog.building("HOUSE").unwrap();
    let architect = catalog.role(RoleId::Architect);
    let player = player_with_effects(RoleId::Architect, &[(EffectKind::PurchaseDiscount, 0.1)]);

    let quote = compute_effective_cost(&player, house, architect, &mut StepRng::new(u64::MAX, 0));
    assert_eq!(quote.final_cost, 80);
    assert!(quote.consumed_effects().is_empty());
}

#[test]
fn increase_and_discount_are_consumed_together() {
    let catalog = Catalog::embedded().unwrap();
    let house = catalog.building("HOUSE").unwrap();
    let player = player_with_effects(
        RoleId::Lucky,
        &[
            (EffectKind::PurchaseIncrease, 0.2),
            (EffectKind::PurchaseDiscount, 0.5),
        ],
    );
    let quote = compute_effective_cost(
        &player,
        house,
        catalog.role(RoleId::Lucky),
        &mut StepRng::new(u64::MAX, 0),
    );
    assert_eq!(quote.inflated_cost, 120);
    assert_eq!(quote.final_cost, 60);
    let mut consumed = quote.consumed_effects();
    consumed.sort_unstable();
    assert_eq!(consumed, vec![0, 1]);
}

#[test]
fn global_first_stays_with_the_first_player() {
    let mut session = quiet_session(5_000);
    let a = session.join_player("Ada", None);
    let b = session.join_player("Bo", None);

    let first = session.buy_building(&a, "TECHPARK").unwrap();
    assert!(first
        .achievements
        .iter()
        .any(|u| u.achievement_id == "FIRST_TECHPARK" && u.global_first));
    let registry_before = session.registry().clone();

    let second = session.buy_building(&b, "TECHPARK").unwrap();
    assert!(second
        .achievements
        .iter()
        .all(|u| u.achievement_id != "FIRST_TECHPARK"));
    assert!(!session.player(&b).unwrap().achievements.contains("FIRST_TECHPARK"));
    assert_eq!(session.registry(), &registry_before);
    assert_eq!(session.registry().winner("FIRST_TECHPARK"), Some(&a));
}

#[test]
fn first_in_city_is_not_reawarded_after_an_upgrade_creates_another() {
    let mut session = quiet_session(20_000);
    let a = session.join_player("Ada", None);
    let b = session.join_player("Bo", None);
    session.buy_building(&a, "LANDMARK").unwrap();
    session.buy_building(&a, "LANDMARK").unwrap();
    let upgrade = session.upgrade_building(&a, "LANDMARK").unwrap();
    // An upgrade never counts as a first purchase.
    assert!(upgrade
        .achievements
        .iter()
        .all(|u| u.achievement_id != "FIRST_SPACEPORT"));
    let bought = session.buy_building(&b, "SPACEPORT").unwrap();
    assert!(bought
        .achievements
        .iter()
        .all(|u| u.achievement_id != "FIRST_SPACEPORT"));
    assert!(session.registry().winner("FIRST_SPACEPORT").is_none());
}

#[test]
fn unlocks_are_announced_with_global_flag() {
    let mut session = quiet_session(5_000);
    let a = session.join_player("Ada", None);
    session.drain_notifications();
    session.buy_building(&a, "TECHPARK").unwrap();
    let unlocks: Vec<(String, bool)> = session
        .drain_notifications()
        .into_iter()
        .filter_map(|e| match e.notification {
            Notification::AchievementUnlocked {
                achievement_id,
                global_first,
                ..
            } => Some((achievement_id, global_first)),
            _ => None,
        })
        .collect();
    assert!(unlocks.contains(&("FIRST_TECHPARK".to_string(), true)));
    assert!(unlocks.contains(&("FIRST_BUILDING".to_string(), false)));
}

#[test]
fn purchases_after_the_end_are_refused() {
    let mut session = quiet_session(500);
    let a = session.join_player("Ada", None);
    let _ = session.end_game();
    assert_eq!(session.buy_building(&a, "HOUSE").unwrap_err(), GameError::GameEnded);
    assert_eq!(session.city().total(), 0);
}

#[test]
fn random_purchase_streams_keep_the_city_consistent() {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    for seed in [3_u64, 17, 99] {
        let catalog = Catalog::embedded().unwrap();
        let mut session = GameSession::new(
            std::sync::Arc::clone(&catalog),
            SessionConfig {
                starting_coins: 2_000,
                ..SessionConfig::default()
            }
            .with_seed(seed),
        )
        .unwrap();
        let ids: Vec<PlayerId> = (0..3)
            .map(|n| session.join_player(format!("Bot {n}"), Some(n)))
            .collect();
        let mut driver = ChaCha20Rng::seed_from_u64(seed);

        for step in 0..300 {
            let id = &ids[driver.gen_range(0..ids.len())];
            match driver.gen_range(0..4) {
                0 | 1 => {
                    let building = &catalog.buildings()[driver.gen_range(0..catalog.buildings().len())];
                    let _ = session.buy_building(id, &building.id);
                }
                2 => {
                    let options = session.upgradeable_buildings(id).unwrap();
                    if let Some(option) = options.first() {
                        session.upgrade_building(id, &option.from).unwrap();
                    }
                }
                _ => {
                    let item = &catalog.items()[driver.gen_range(0..catalog.items().len())];
                    if session.buy_item(id, &item.id).is_ok() {
                        let _ = session.use_item(id, &item.id);
                    }
                }
            }
            assert!(
                session.city().is_consistent_with(session.players().iter()),
                "seed {seed} step {step}"
            );
            assert!(session.players().iter().all(|p| p.coins >= 0));
        }
    }
}

#[test]
fn mini_event_discount_is_labelled_with_the_event_name() {
    let mut session = GameSession::new(
        Catalog::embedded().unwrap(),
        SessionConfig {
            starting_coins: 10_000,
            ..SessionConfig::default()
        },
    )
    .unwrap()
    .with_rng(RngBundle::uniform(StepRng::new(0, 0)));
    let id = session.join_player("Ada", None);
    session.assign_role(&id, RoleId::Landlord).unwrap();

    let first = session.buy_building(&id, "HOUSE").unwrap();
    let mini = first.mini_event.expect("every roll wins");
    assert_eq!(mini.event_id, "DISCOUNT_NEXT");
    let pending = session.player(&id).unwrap();
    let (_, effect) = pending.first_effect(EffectKind::PurchaseDiscount).unwrap();
    assert_eq!(effect.source, "Clearance Sale");

    let second = session.buy_building(&id, "SHOP").unwrap();
    assert_eq!(
        second.quote.discount_source,
        Some(DiscountSource::Item {
            label: "Clearance Sale".to_string()
        })
    );
}
