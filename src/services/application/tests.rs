use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use sea_orm::{ConnectionTrait, DbBackend, Statement};

use super::codeplug_service::CodeplugService;
use crate::models::entities::{codeplug, system, zone};
use crate::models::enums::CollectionKind;
use crate::models::structs::{ChannelView, ModeDetail};
use crate::services::infrastructure::SqliteOrmPersistenceService;
use crate::services::traits::{
    BaseService, IChannelGenerationService, IOrderedCollectionService, ITalkgroupAssignmentService,
    PersistenceService,
};
use crate::utils::config::{OrderingConfig, PersistenceConfig};
use crate::utils::error::AppError;

/// 测试环境：内存数据库上的持久化服务和码本服务
struct Fixture {
    persistence: SqliteOrmPersistenceService,
    service: CodeplugService,
}

async fn setup() -> Fixture {
    setup_with(OrderingConfig::default()).await
}

async fn setup_with(ordering_config: OrderingConfig) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let persistence = SqliteOrmPersistenceService::new(&PersistenceConfig::in_memory())
        .await
        .unwrap();
    let service = CodeplugService::new(persistence.connection(), ordering_config);
    Fixture { persistence, service }
}

impl Fixture {
    async fn codeplug(&self, name: &str) -> codeplug::Model {
        self.persistence.create_codeplug(name, "owner-1").await.unwrap()
    }

    async fn zone(&self, name: &str) -> zone::Model {
        self.persistence.create_zone(name, "owner-1", false).await.unwrap()
    }

    async fn system(&self, name: &str, mode: ModeDetail) -> system::Model {
        self.persistence.create_system(name, "owner-1", mode).await.unwrap()
    }

    /// 创建通话组和系统配置，并分配给系统挂载
    async fn assign(&self, system: &system::Model, zone_system_id: &str, talkgroup_name: &str) -> String {
        let talkgroup = self.persistence.create_talkgroup(talkgroup_name, 3100).await.unwrap();
        let config = self
            .persistence
            .create_system_talkgroup(&system.id, &talkgroup.id, None)
            .await
            .unwrap();
        self.service.assign_talkgroup(zone_system_id, &config.id).await.unwrap();
        config.id
    }

    async fn attach_zone(&self, codeplug: &codeplug::Model, zone: &zone::Model) -> String {
        self.service
            .append(CollectionKind::CodeplugZones, &codeplug.id, &zone.id)
            .await
            .unwrap()
            .id
    }

    async fn attach_system(&self, zone: &zone::Model, system: &system::Model) -> String {
        self.service
            .append(CollectionKind::ZoneSystems, &zone.id, &system.id)
            .await
            .unwrap()
            .id
    }

    async fn children(&self, kind: CollectionKind, parent_id: &str) -> Vec<(String, i32)> {
        self.service
            .list(kind, parent_id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| (p.child_id, p.position))
            .collect()
    }

    async fn channels(&self, codeplug: &codeplug::Model) -> Vec<ChannelView> {
        self.persistence.list_codeplug_channels(&codeplug.id).await.unwrap()
    }
}

fn desired<S: AsRef<str>>(pairs: &[(S, i32)]) -> HashMap<String, i32> {
    pairs
        .iter()
        .map(|(child, position)| (child.as_ref().to_string(), *position))
        .collect()
}

// ==================== 有序集合 ====================

#[tokio::test]
async fn test_append_assigns_consecutive_positions() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Plug").await;
    let zones = [fx.zone("A").await, fx.zone("B").await, fx.zone("C").await];

    for (index, zone) in zones.iter().enumerate() {
        let placement = fx
            .service
            .append(CollectionKind::CodeplugZones, &codeplug.id, &zone.id)
            .await
            .unwrap();
        assert_eq!(placement.position, index as i32 + 1);
        assert_eq!(placement.parent_id, codeplug.id);
    }

    let report = fx
        .service
        .verify_contiguity(CollectionKind::CodeplugZones, &codeplug.id)
        .await
        .unwrap();
    assert!(report.is_contiguous);
    assert_eq!(report.positions, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_append_rejections_leave_collection_unchanged() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Plug").await;
    let zone = fx.zone("A").await;
    fx.attach_zone(&codeplug, &zone).await;

    // 重复子项
    let err = fx
        .service
        .append(CollectionKind::CodeplugZones, &codeplug.id, &zone.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    // 子项不存在
    let err = fx
        .service
        .append(CollectionKind::CodeplugZones, &codeplug.id, "missing-zone")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFoundError { ref resource_type, .. } if resource_type == "Zone"));

    // 父项不存在
    let err = fx
        .service
        .append(CollectionKind::ZoneSystems, "missing-zone", "missing-system")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFoundError { ref resource_type, .. } if resource_type == "Zone"));

    assert_eq!(
        fx.children(CollectionKind::CodeplugZones, &codeplug.id).await,
        vec![(zone.id.clone(), 1)]
    );
}

#[tokio::test]
async fn test_remove_compacts_following_positions() {
    let fx = setup().await;
    let zone = fx.zone("Z").await;
    let a = fx.system("A", ModeDetail::Analog).await;
    let b = fx.system("B", ModeDetail::Analog).await;
    let c = fx.system("C", ModeDetail::Analog).await;
    let d = fx.system("D", ModeDetail::Analog).await;
    for system in [&a, &b, &c, &d] {
        fx.attach_system(&zone, system).await;
    }

    let removed = fx
        .service
        .remove(CollectionKind::ZoneSystems, &zone.id, &b.id)
        .await
        .unwrap();
    assert_eq!(removed.position, 2);
    assert_eq!(
        fx.children(CollectionKind::ZoneSystems, &zone.id).await,
        vec![(a.id.clone(), 1), (c.id.clone(), 2), (d.id.clone(), 3)]
    );

    // 删除末尾不移动任何兄弟
    fx.service.remove(CollectionKind::ZoneSystems, &zone.id, &d.id).await.unwrap();
    assert_eq!(
        fx.children(CollectionKind::ZoneSystems, &zone.id).await,
        vec![(a.id.clone(), 1), (c.id.clone(), 2)]
    );

    // 删除后再追加，位置仍然紧接末尾
    let placement = fx.service.append(CollectionKind::ZoneSystems, &zone.id, &b.id).await.unwrap();
    assert_eq!(placement.position, 3);

    let err = fx
        .service
        .remove(CollectionKind::ZoneSystems, &zone.id, &d.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND_ERROR");
}

#[tokio::test]
async fn test_reorder_full_permutation() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Plug").await;
    let a = fx.zone("A").await;
    let b = fx.zone("B").await;
    let c = fx.zone("C").await;
    for zone in [&a, &b, &c] {
        fx.attach_zone(&codeplug, zone).await;
    }

    let placements = fx
        .service
        .reorder(
            CollectionKind::CodeplugZones,
            &codeplug.id,
            &desired(&[(&a.id, 3), (&b.id, 1), (&c.id, 2)]),
        )
        .await
        .unwrap();

    let order: Vec<&str> = placements.iter().map(|p| p.child_id.as_str()).collect();
    assert_eq!(order, vec![b.id.as_str(), c.id.as_str(), a.id.as_str()]);
    assert!(fx
        .service
        .verify_contiguity(CollectionKind::CodeplugZones, &codeplug.id)
        .await
        .unwrap()
        .is_contiguous);
}

#[tokio::test]
async fn test_reorder_partial_swap_and_noop() {
    let fx = setup().await;
    let zone = fx.zone("Z").await;
    let systems = [
        fx.system("A", ModeDetail::Analog).await,
        fx.system("B", ModeDetail::Analog).await,
        fx.system("C", ModeDetail::Analog).await,
        fx.system("D", ModeDetail::Analog).await,
    ];
    for system in &systems {
        fx.attach_system(&zone, system).await;
    }

    // 只交换 B 和 D
    fx.service
        .reorder(
            CollectionKind::ZoneSystems,
            &zone.id,
            &desired(&[(&systems[1].id, 4), (&systems[3].id, 2)]),
        )
        .await
        .unwrap();
    assert_eq!(
        fx.children(CollectionKind::ZoneSystems, &zone.id).await,
        vec![
            (systems[0].id.clone(), 1),
            (systems[3].id.clone(), 2),
            (systems[2].id.clone(), 3),
            (systems[1].id.clone(), 4),
        ]
    );

    // 目标位置与当前一致时不写入，结果不变
    let before = fx.service.list(CollectionKind::ZoneSystems, &zone.id).await.unwrap();
    let after = fx
        .service
        .reorder(
            CollectionKind::ZoneSystems,
            &zone.id,
            &desired(&[(&systems[0].id, 1), (&systems[2].id, 3)]),
        )
        .await
        .unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_reorder_rejections_leave_positions_unchanged() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Plug").await;
    let a = fx.zone("A").await;
    let b = fx.zone("B").await;
    let outsider = fx.zone("Outsider").await;
    fx.attach_zone(&codeplug, &a).await;
    fx.attach_zone(&codeplug, &b).await;
    let before = fx.children(CollectionKind::CodeplugZones, &codeplug.id).await;

    for request in [
        desired(&[(&a.id, 1), (&b.id, 1)]),
        desired(&[(&a.id, 3), (&b.id, 1)]),
        desired(&[(&a.id, 0), (&b.id, 2)]),
        desired(&[(&outsider.id, 1)]),
        desired(&[(&a.id, 2)]),
    ] {
        let err = fx
            .service
            .reorder(CollectionKind::CodeplugZones, &codeplug.id, &request)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(fx.children(CollectionKind::CodeplugZones, &codeplug.id).await, before);
    }

    let err = fx
        .service
        .reorder(CollectionKind::CodeplugZones, "missing", &desired(&[(&a.id, 1)]))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND_ERROR");
}

#[tokio::test]
async fn test_reorder_with_small_temporary_offset() {
    // 偏移量很小时临时空间仍然在 N 之后，不会与最终位置冲突
    let fx = setup_with(OrderingConfig {
        temporary_position_offset: 1,
        conflict_retry_count: 0,
    })
    .await;
    let codeplug = fx.codeplug("Plug").await;
    let zones = [fx.zone("A").await, fx.zone("B").await, fx.zone("C").await];
    for zone in &zones {
        fx.attach_zone(&codeplug, zone).await;
    }

    fx.service
        .reorder(
            CollectionKind::CodeplugZones,
            &codeplug.id,
            &desired(&[(&zones[0].id, 3), (&zones[1].id, 2), (&zones[2].id, 1)]),
        )
        .await
        .unwrap();
    assert_eq!(
        fx.children(CollectionKind::CodeplugZones, &codeplug.id).await,
        vec![(zones[2].id.clone(), 1), (zones[1].id.clone(), 2), (zones[0].id.clone(), 3)]
    );
}

// ==================== 信道生成 ====================

#[tokio::test]
async fn test_generate_analog_and_dmr_example() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Field Plug").await;
    let zone = fx.zone("Z1").await;
    let bravo = fx.system("Bravo", ModeDetail::Analog).await;
    let dmr = fx.system("DMR-1", ModeDetail::Dmr { color_code: 1 }).await;
    fx.attach_zone(&codeplug, &zone).await;
    fx.attach_system(&zone, &bravo).await;
    let dmr_placement = fx.attach_system(&zone, &dmr).await;
    let virginia = fx.assign(&dmr, &dmr_placement, "Virginia").await;

    let summary = fx.service.generate_channels(&codeplug.id, false).await.unwrap();
    assert!(!summary.skipped);
    assert_eq!(summary.channels_created, 2);
    assert_eq!(summary.channel_placements_created, 2);
    assert_eq!(summary.zones_processed, 1);
    assert_eq!(summary.channels_deleted, 0);

    let channels = fx.channels(&codeplug).await;
    assert_eq!(channels.len(), 2);

    assert_eq!(channels[0].position, 1);
    assert_eq!(channels[0].zone_id, zone.id);
    assert_eq!(channels[0].system_id, bravo.id);
    assert_eq!(channels[0].system_talkgroup_id, None);
    assert_eq!(channels[0].name, "Bravo");
    assert_eq!(channels[0].long_name, "Bravo");
    assert_eq!(channels[0].short_name, "Bravo");

    assert_eq!(channels[1].position, 2);
    assert_eq!(channels[1].system_id, dmr.id);
    assert_eq!(channels[1].system_talkgroup_id.as_deref(), Some(virginia.as_str()));
    assert_eq!(channels[1].name, "Virginia");
    assert_eq!(channels[1].long_name, "DMR-1 - Virginia");
    assert_eq!(channels[1].short_name, "Virginia");

    for channel in &channels {
        assert_eq!(channel.tone_mode.to_string(), "none");
        assert_eq!(channel.transmit_permission.to_string(), "allow");
    }
}

#[tokio::test]
async fn test_generate_follows_placement_order_and_assignment_order() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Plug").await;
    let north = fx.zone("North").await;
    let south = fx.zone("South").await;
    let empty = fx.zone("Empty").await;
    fx.attach_zone(&codeplug, &north).await;
    fx.attach_zone(&codeplug, &south).await;
    fx.attach_zone(&codeplug, &empty).await;

    let p25 = fx.system("P25 Metro", ModeDetail::P25 { nac: 0x293 }).await;
    let idle = fx.system("NXDN Idle", ModeDetail::Nxdn { ran: 5 }).await;
    let repeater = fx.system("South Repeater", ModeDetail::Analog).await;

    let p25_placement = fx.attach_system(&north, &p25).await;
    fx.attach_system(&north, &idle).await;
    fx.attach_system(&south, &repeater).await;
    // 按分配创建顺序展开，而不是按名称
    fx.assign(&p25, &p25_placement, "Zulu Dispatch").await;
    fx.assign(&p25, &p25_placement, "Alpha Tactical").await;

    // 把 South 移到 North 前面
    fx.service
        .reorder(
            CollectionKind::CodeplugZones,
            &codeplug.id,
            &desired(&[(&north.id, 2), (&south.id, 1)]),
        )
        .await
        .unwrap();

    let summary = fx.service.generate_channels(&codeplug.id, false).await.unwrap();
    assert_eq!(summary.channels_created, 3);
    assert_eq!(summary.zones_processed, 3);

    let channels = fx.channels(&codeplug).await;
    let listing: Vec<(&str, i32, &str)> = channels
        .iter()
        .map(|c| (c.zone_id.as_str(), c.position, c.long_name.as_str()))
        .collect();
    assert_eq!(
        listing,
        vec![
            (south.id.as_str(), 1, "South Repeater"),
            (north.id.as_str(), 1, "P25 Metro - Zulu Dispatch"),
            (north.id.as_str(), 2, "P25 Metro - Alpha Tactical"),
        ]
    );
    assert_eq!(channels[2].short_name, "AlphaTac");
}

#[tokio::test]
async fn test_regenerate_unchanged_graph_is_deterministic() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Plug").await;
    let zone = fx.zone("Z").await;
    let analog = fx.system("Very Long Repeater Name That Exceeds Limits", ModeDetail::Analog).await;
    let nxdn = fx.system("NXDN-1", ModeDetail::Nxdn { ran: 12 }).await;
    fx.attach_zone(&codeplug, &zone).await;
    fx.attach_system(&zone, &analog).await;
    let nxdn_placement = fx.attach_system(&zone, &nxdn).await;
    let first_tg = fx.assign(&nxdn, &nxdn_placement, "Ops One").await;
    let second_tg = fx.assign(&nxdn, &nxdn_placement, "Ops Two").await;

    let summary = fx.service.generate_channels(&codeplug.id, false).await.unwrap();
    assert_eq!(summary.channels_created, 3);
    let first = fx.channels(&codeplug).await;

    // 模拟信道无通话组，两个数字信道的通话组各不相同
    assert_eq!(first[0].system_talkgroup_id, None);
    assert_eq!(first[0].short_name, "VeryLong");
    assert_eq!(first[1].system_talkgroup_id.as_deref(), Some(first_tg.as_str()));
    assert_eq!(first[2].system_talkgroup_id.as_deref(), Some(second_tg.as_str()));

    fx.service.generate_channels(&codeplug.id, true).await.unwrap();
    let second = fx.channels(&codeplug).await;

    let shape = |channels: &[ChannelView]| -> Vec<(String, i32, String, Option<String>)> {
        channels
            .iter()
            .map(|c| (c.zone_id.clone(), c.position, c.system_id.clone(), c.system_talkgroup_id.clone()))
            .collect()
    };
    assert_eq!(shape(&first), shape(&second));
}

#[tokio::test]
async fn test_generate_skips_when_channels_exist() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Plug").await;
    let zone = fx.zone("Z").await;
    let system = fx.system("Bravo", ModeDetail::Analog).await;
    fx.attach_zone(&codeplug, &zone).await;
    fx.attach_system(&zone, &system).await;

    fx.service.generate_channels(&codeplug.id, false).await.unwrap();
    let first = fx.channels(&codeplug).await;

    let summary = fx.service.generate_channels(&codeplug.id, false).await.unwrap();
    assert!(summary.skipped);
    assert_eq!(summary.channels_created, 0);
    assert_eq!(fx.channels(&codeplug).await, first);
}

#[tokio::test]
async fn test_regenerate_replaces_channels() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Plug").await;
    let zone = fx.zone("Z").await;
    let bravo = fx.system("Bravo", ModeDetail::Analog).await;
    let charlie = fx.system("Charlie", ModeDetail::Analog).await;
    fx.attach_zone(&codeplug, &zone).await;
    fx.attach_system(&zone, &bravo).await;

    fx.service.generate_channels(&codeplug.id, false).await.unwrap();
    let first = fx.channels(&codeplug).await;

    fx.attach_system(&zone, &charlie).await;
    let summary = fx.service.generate_channels(&codeplug.id, true).await.unwrap();
    assert_eq!(summary.channels_deleted, 1);
    assert_eq!(summary.channels_created, 2);
    assert_eq!(fx.persistence.count_channels(&codeplug.id).await.unwrap(), 2);

    let second = fx.channels(&codeplug).await;
    let names: Vec<&str> = second.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Bravo", "Charlie"]);
    assert_ne!(second[0].channel_id, first[0].channel_id);
    assert!(fx
        .service
        .verify_contiguity(CollectionKind::ZoneChannels, &second[0].codeplug_zone_id)
        .await
        .unwrap()
        .is_contiguous);
}

#[tokio::test]
async fn test_generate_digital_without_assignments_and_empty_codeplug() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Plug").await;

    let summary = fx.service.generate_channels(&codeplug.id, false).await.unwrap();
    assert!(!summary.skipped);
    assert_eq!(summary.channels_created, 0);
    assert_eq!(summary.zones_processed, 0);

    let zone = fx.zone("Z").await;
    let dmr = fx.system("DMR-1", ModeDetail::Dmr { color_code: 2 }).await;
    fx.attach_zone(&codeplug, &zone).await;
    fx.attach_system(&zone, &dmr).await;

    let summary = fx.service.generate_channels(&codeplug.id, false).await.unwrap();
    assert_eq!(summary.channels_created, 0);
    assert_eq!(summary.zones_processed, 1);
    assert!(fx.channels(&codeplug).await.is_empty());

    let err = fx.service.generate_channels("missing", false).await.unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND_ERROR");
}

#[tokio::test]
async fn test_shared_zone_generates_per_codeplug() {
    let fx = setup().await;
    let first = fx.codeplug("First").await;
    let second = fx.codeplug("Second").await;
    let shared = fx.zone("Shared").await;
    let own = fx.zone("Own").await;
    let bravo = fx.system("Bravo", ModeDetail::Analog).await;
    let delta = fx.system("Delta", ModeDetail::Analog).await;
    fx.attach_system(&shared, &bravo).await;
    fx.attach_system(&own, &delta).await;

    fx.attach_zone(&first, &shared).await;
    fx.attach_zone(&second, &own).await;
    fx.attach_zone(&second, &shared).await;

    fx.service.generate_channels(&first.id, false).await.unwrap();
    fx.service.generate_channels(&second.id, false).await.unwrap();

    let first_channels = fx.channels(&first).await;
    let second_channels = fx.channels(&second).await;
    assert_eq!(first_channels.len(), 1);
    assert_eq!(second_channels.len(), 2);

    // 同一个分区在两个码本中各自从 1 开始编号
    assert_eq!(first_channels[0].zone_id, shared.id);
    assert_eq!(first_channels[0].position, 1);
    assert_eq!(second_channels[1].zone_id, shared.id);
    assert_eq!(second_channels[1].position, 1);
    assert_ne!(first_channels[0].codeplug_zone_id, second_channels[1].codeplug_zone_id);

    // 重新生成一个码本不影响另一个
    fx.service.generate_channels(&first.id, true).await.unwrap();
    assert_eq!(fx.channels(&second).await, second_channels);
}

#[tokio::test]
async fn test_failed_generation_rolls_back() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Plug").await;
    let first_zone = fx.zone("First").await;
    let second_zone = fx.zone("Second").await;
    let bravo = fx.system("Bravo", ModeDetail::Analog).await;
    let dmr = fx.system("DMR-1", ModeDetail::Dmr { color_code: 1 }).await;
    fx.attach_zone(&codeplug, &first_zone).await;
    fx.attach_zone(&codeplug, &second_zone).await;
    fx.attach_system(&first_zone, &bravo).await;
    let dmr_placement = fx.attach_system(&second_zone, &dmr).await;
    fx.assign(&dmr, &dmr_placement, "Virginia").await;

    fx.service.generate_channels(&codeplug.id, false).await.unwrap();
    let before = fx.channels(&codeplug).await;
    assert_eq!(before.len(), 2);

    // 破坏第二个分区里系统的模式详情，使生成在中途失败
    let conn = fx.persistence.connection();
    conn.execute(Statement::from_string(
        DbBackend::Sqlite,
        format!("UPDATE systems SET color_code = NULL WHERE id = '{}'", dmr.id),
    ))
    .await
    .unwrap();

    let err = fx.service.generate_channels(&codeplug.id, true).await.unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert_eq!(fx.channels(&codeplug).await, before);
}

// ==================== 分区内信道 ====================

#[tokio::test]
async fn test_zone_channels_collection_after_generation() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Plug").await;
    let other = fx.codeplug("Other").await;
    let zone = fx.zone("Z").await;
    let systems = [
        fx.system("A", ModeDetail::Analog).await,
        fx.system("B", ModeDetail::Analog).await,
        fx.system("C", ModeDetail::Analog).await,
    ];
    for system in &systems {
        fx.attach_system(&zone, system).await;
    }
    let codeplug_zone_id = fx.attach_zone(&codeplug, &zone).await;
    fx.attach_zone(&other, &zone).await;
    fx.service.generate_channels(&codeplug.id, false).await.unwrap();
    fx.service.generate_channels(&other.id, false).await.unwrap();

    let channels = fx.channels(&codeplug).await;
    let ids: Vec<String> = channels.iter().map(|c| c.channel_id.clone()).collect();

    // 把第一个信道移到末尾
    fx.service
        .reorder(
            CollectionKind::ZoneChannels,
            &codeplug_zone_id,
            &desired(&[(&ids[0], 3), (&ids[1], 1), (&ids[2], 2)]),
        )
        .await
        .unwrap();
    let names: Vec<String> = fx.channels(&codeplug).await.into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["B", "C", "A"]);

    // 删除后压缩，再追加回末尾
    fx.service
        .remove(CollectionKind::ZoneChannels, &codeplug_zone_id, &ids[1])
        .await
        .unwrap();
    let placement = fx
        .service
        .append(CollectionKind::ZoneChannels, &codeplug_zone_id, &ids[1])
        .await
        .unwrap();
    assert_eq!(placement.position, 3);

    // 其他码本的信道不能挂到这个分区挂载
    let foreign = fx.channels(&other).await;
    let err = fx
        .service
        .append(CollectionKind::ZoneChannels, &codeplug_zone_id, &foreign[0].channel_id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert_eq!(fx.children(CollectionKind::ZoneChannels, &codeplug_zone_id).await.len(), 3);
}

#[tokio::test]
async fn test_removing_zone_drops_its_channel_placements() {
    let fx = setup().await;
    let codeplug = fx.codeplug("Plug").await;
    let first = fx.zone("First").await;
    let second = fx.zone("Second").await;
    let bravo = fx.system("Bravo", ModeDetail::Analog).await;
    fx.attach_system(&first, &bravo).await;
    fx.attach_system(&second, &bravo).await;
    let first_placement = fx.attach_zone(&codeplug, &first).await;
    fx.attach_zone(&codeplug, &second).await;
    fx.service.generate_channels(&codeplug.id, false).await.unwrap();

    fx.service
        .remove(CollectionKind::CodeplugZones, &codeplug.id, &first.id)
        .await
        .unwrap();

    assert!(fx.children(CollectionKind::ZoneChannels, &first_placement).await.is_empty());
    let channels = fx.channels(&codeplug).await;
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].zone_id, second.id);
    assert_eq!(
        fx.children(CollectionKind::CodeplugZones, &codeplug.id).await,
        vec![(second.id.clone(), 1)]
    );
}

// ==================== 通话组分配 ====================

#[tokio::test]
async fn test_assign_talkgroup_rules() {
    let fx = setup().await;
    let zone = fx.zone("Z").await;
    let analog = fx.system("Bravo", ModeDetail::Analog).await;
    let dmr = fx.system("DMR-1", ModeDetail::Dmr { color_code: 1 }).await;
    let other_dmr = fx.system("DMR-2", ModeDetail::Dmr { color_code: 2 }).await;
    let analog_placement = fx.attach_system(&zone, &analog).await;
    let dmr_placement = fx.attach_system(&zone, &dmr).await;

    let talkgroup = fx.persistence.create_talkgroup("Virginia", 3151).await.unwrap();
    let dmr_config = fx
        .persistence
        .create_system_talkgroup(&dmr.id, &talkgroup.id, Some(1))
        .await
        .unwrap();
    let foreign_config = fx
        .persistence
        .create_system_talkgroup(&other_dmr.id, &talkgroup.id, Some(2))
        .await
        .unwrap();

    let err = fx
        .service
        .assign_talkgroup(&analog_placement, &dmr_config.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let err = fx
        .service
        .assign_talkgroup(&dmr_placement, &foreign_config.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let assignment = fx.service.assign_talkgroup(&dmr_placement, &dmr_config.id).await.unwrap();
    assert_eq!(assignment.zone_system_id, dmr_placement);

    let err = fx
        .service
        .assign_talkgroup(&dmr_placement, &dmr_config.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");

    let err = fx.service.assign_talkgroup("missing", &dmr_config.id).await.unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND_ERROR");
    let err = fx.service.assign_talkgroup(&dmr_placement, "missing").await.unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND_ERROR");

    fx.service.unassign_talkgroup(&dmr_placement, &dmr_config.id).await.unwrap();
    let err = fx
        .service
        .unassign_talkgroup(&dmr_placement, &dmr_config.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND_ERROR");
}

// ==================== 冲突重试 ====================

#[tokio::test]
async fn test_conflict_is_retried_once_by_default() {
    let fx = setup().await;
    let attempts = AtomicU32::new(0);

    let result = fx
        .service
        .run_with_retry("测试冲突", || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(AppError::conflict_error("位置冲突"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(result, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_persistent_conflict_surfaces_after_retry() {
    let fx = setup().await;
    let attempts = AtomicU32::new(0);

    let err = fx
        .service
        .run_with_retry("测试冲突", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(AppError::conflict_error("位置冲突")) }
        })
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "CONFLICT_ERROR");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_non_conflict_errors_are_not_retried() {
    let fx = setup_with(OrderingConfig {
        temporary_position_offset: 1000,
        conflict_retry_count: 3,
    })
    .await;
    let attempts = AtomicU32::new(0);

    let err = fx
        .service
        .run_with_retry("测试校验", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(AppError::validation_error("目标位置存在重复")) }
        })
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unique_violation_maps_to_retryable_conflict() {
    let fx = setup().await;
    let zone = fx.zone("Zone").await;
    let bravo = fx.system("Bravo", ModeDetail::Analog).await;
    let charlie = fx.system("Charlie", ModeDetail::Analog).await;
    fx.attach_system(&zone, &bravo).await;

    // 绕过追加协议，直接写入与已有挂载相同的 (zone_id, position)
    let conn = fx.persistence.connection();
    let db_err = conn
        .execute(Statement::from_string(
            DbBackend::Sqlite,
            format!(
                "INSERT INTO zone_systems (id, zone_id, system_id, position) VALUES ('dup', '{}', '{}', 1)",
                zone.id, charlie.id
            ),
        ))
        .await
        .unwrap_err();

    let err = AppError::from_db("插入重复位置", db_err);
    assert_eq!(err.error_code(), "CONFLICT_ERROR");
    assert!(err.is_retryable());
    assert_eq!(
        fx.children(CollectionKind::ZoneSystems, &zone.id).await,
        vec![(bravo.id.clone(), 1)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_on_pooled_file_database() {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config = PersistenceConfig {
        database_url: format!("sqlite://{}?mode=rwc", temp_dir.path().join("codeplug.db").display()),
        max_connections: 4,
        sqlx_logging: false,
    };
    let persistence = SqliteOrmPersistenceService::new(&config).await.unwrap();
    let service = Arc::new(CodeplugService::new(persistence.connection(), OrderingConfig::default()));

    let zone = persistence.create_zone("Shared", "owner-1", false).await.unwrap();
    let mut systems = Vec::new();
    for index in 0..16 {
        systems.push(
            persistence
                .create_system(&format!("Sys-{}", index), "owner-1", ModeDetail::Analog)
                .await
                .unwrap(),
        );
    }

    let mut handles = Vec::new();
    for system in &systems {
        let service = service.clone();
        let zone_id = zone.id.clone();
        let system_id = system.id.clone();
        handles.push(tokio::spawn(async move {
            service.append(CollectionKind::ZoneSystems, &zone_id, &system_id).await
        }));
    }

    let mut positions = Vec::new();
    for handle in handles {
        positions.push(handle.await.unwrap().unwrap().position);
    }
    positions.sort_unstable();
    assert_eq!(positions, (1..=16).collect::<Vec<i32>>());

    let report = service
        .verify_contiguity(CollectionKind::ZoneSystems, &zone.id)
        .await
        .unwrap();
    assert!(report.is_contiguous);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_generation_on_pooled_file_database() {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config = PersistenceConfig {
        database_url: format!("sqlite://{}?mode=rwc", temp_dir.path().join("codeplug.db").display()),
        max_connections: 4,
        sqlx_logging: false,
    };
    let persistence = SqliteOrmPersistenceService::new(&config).await.unwrap();
    let service = Arc::new(CodeplugService::new(persistence.connection(), OrderingConfig::default()));

    let codeplug = persistence.create_codeplug("Plug", "owner-1").await.unwrap();
    let zone = persistence.create_zone("Zone", "owner-1", false).await.unwrap();
    let bravo = persistence.create_system("Bravo", "owner-1", ModeDetail::Analog).await.unwrap();
    service.append(CollectionKind::CodeplugZones, &codeplug.id, &zone.id).await.unwrap();
    service.append(CollectionKind::ZoneSystems, &zone.id, &bravo.id).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = service.clone();
        let codeplug_id = codeplug.id.clone();
        handles.push(tokio::spawn(async move { service.generate_channels(&codeplug_id, true).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let channels = persistence.list_codeplug_channels(&codeplug.id).await.unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(persistence.count_channels(&codeplug.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_service_health() {
    let mut fx = setup().await;
    assert_eq!(fx.service.service_name(), "CodeplugService");
    fx.service.initialize().await.unwrap();
    fx.service.health_check().await.unwrap();
    fx.service.shutdown().await.unwrap();
}
