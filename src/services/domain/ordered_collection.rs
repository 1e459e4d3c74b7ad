//! # 有序集合领域服务 (Ordered Collection)
//!
//! ## 业务说明
//! 同一父项下的兄弟挂载记录各自携带唯一的整数 position，静止时恰好为 {1..N}。
//! 本模块实现三个操作，供码本内分区、分区内系统、分区内信道三种集合共用：
//! - **append**: 追加到末尾，position = 当前最大值 + 1
//! - **remove**: 删除后将其后的兄弟依次前移一位，恢复连续性
//! - **reorder**: 两阶段写入（先移到临时位置空间，再写最终位置），
//!   避免逐条更新时与尚未移动的兄弟发生唯一性冲突
//!
//! ## 事务约定
//! 所有方法都在调用方传入的事务连接上执行，不自行提交；
//! 调用方（应用层）负责 begin/commit，以及冲突时的整体重试
//!
//! ## 并发控制
//! 读取兄弟之前先锁住父项，使“读取最大位置 → 插入”在同一父项上串行化：
//! - 非 SQLite 后端: SELECT ... FOR UPDATE
//! - SQLite: sqlx 以 DEFERRED 方式开启事务，先读后写的两个事务会在升级写锁时
//!   直接得到 SQLITE_BUSY；因此事务的第一条语句是一次不改变数据的父项更新，
//!   提前取得写锁，其余写者在 busy_timeout 内排队等待

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::error::{AppError, AppResult};
use crate::models::entities::{channel, codeplug, codeplug_zone, system, zone, zone_channel, zone_system};
use crate::models::structs::{default_id, ContiguityReport, Placement};
use crate::{log_ordering_event, log_user_operation};

/// 有序挂载实体
///
/// 描述一张挂载表的父项列、子项列、位置列，以及如何构造新的挂载记录。
/// 实现者只需给出列映射，追加/删除/重排的协议由 OrderedCollection 统一实现
pub trait OrderedPlacement: EntityTrait {
    /// 挂载记录的 ActiveModel
    type Placement: ActiveModelTrait<Entity = Self> + ActiveModelBehavior + Send + 'static;
    /// 父项实体
    type Parent: EntityTrait;
    /// 子项实体
    type Child: EntityTrait;

    /// 父项资源名称（用于错误信息）
    const PARENT_RESOURCE: &'static str;
    /// 子项资源名称（用于错误信息）
    const CHILD_RESOURCE: &'static str;

    fn id_column() -> Self::Column;
    fn parent_column() -> Self::Column;
    fn child_column() -> Self::Column;
    fn position_column() -> Self::Column;

    /// 父项表的主键列
    fn parent_key() -> <Self::Parent as EntityTrait>::Column;
    /// 父项表中用于取得 SQLite 写锁的非键列（原值写回）
    fn parent_lock_column() -> <Self::Parent as EntityTrait>::Column;
    /// 子项表的主键列
    fn child_key() -> <Self::Child as EntityTrait>::Column;

    /// 转换为通用挂载记录
    fn to_placement(model: &Self::Model) -> Placement;

    /// 构造新的挂载记录
    fn new_placement(
        parent: &<Self::Parent as EntityTrait>::Model,
        child_id: &str,
        position: i32,
    ) -> Self::Placement;

    /// 追加前对父子关系的额外校验，默认不限制
    fn check_child(
        _parent: &<Self::Parent as EntityTrait>::Model,
        _child: &<Self::Child as EntityTrait>::Model,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// 有序集合
///
/// 无状态，只携带两阶段重排使用的临时位置偏移量
pub struct OrderedCollection<E> {
    temporary_position_offset: i32,
    _entity: PhantomData<fn() -> E>,
}

impl<E> OrderedCollection<E>
where
    E: OrderedPlacement,
    E::Model: IntoActiveModel<E::Placement>,
{
    pub fn new(temporary_position_offset: i32) -> Self {
        Self {
            temporary_position_offset,
            _entity: PhantomData,
        }
    }

    /// 按位置升序列出父项下的全部挂载记录
    pub async fn list<C: ConnectionTrait>(&self, db: &C, parent_id: &str) -> AppResult<Vec<Placement>> {
        let models = E::find()
            .filter(E::parent_column().eq(parent_id))
            .order_by_asc(E::position_column())
            .all(db)
            .await
            .map_err(|e| AppError::from_db(format!("加载 {} 的挂载记录失败", E::PARENT_RESOURCE), e))?;
        Ok(models.iter().map(E::to_placement).collect())
    }

    /// 追加子项到父项末尾
    ///
    /// position = 当前最大位置 + 1（空集合为 1），不重排已有兄弟
    pub async fn append<C: ConnectionTrait>(&self, db: &C, parent_id: &str, child_id: &str) -> AppResult<Placement> {
        let parent = self.lock_parent(db, parent_id).await?;

        let child = E::Child::find()
            .filter(E::child_key().eq(child_id))
            .one(db)
            .await
            .map_err(|e| AppError::from_db(format!("加载{}失败", E::CHILD_RESOURCE), e))?
            .ok_or_else(|| {
                AppError::not_found_error(E::CHILD_RESOURCE, format!("未找到ID为 {} 的{}", child_id, E::CHILD_RESOURCE))
            })?;
        E::check_child(&parent, &child)?;

        let siblings = self.list(db, parent_id).await?;
        if siblings.iter().any(|p| p.child_id == child_id) {
            return Err(AppError::validation_error(format!(
                "{} {} 已存在于 {} {} 中",
                E::CHILD_RESOURCE, child_id, E::PARENT_RESOURCE, parent_id
            )));
        }

        let position = siblings.last().map(|p| p.position + 1).unwrap_or(1);
        let model = E::new_placement(&parent, child_id, position)
            .insert(db)
            .await
            .map_err(|e| AppError::from_db(format!("插入{}挂载记录失败", E::CHILD_RESOURCE), e))?;

        log_ordering_event!("{} {} 追加到 {} {} 的位置 {}", E::CHILD_RESOURCE, child_id, E::PARENT_RESOURCE, parent_id, position);
        Ok(E::to_placement(&model))
    }

    /// 删除子项并压缩其后的位置
    ///
    /// 返回被删除的挂载记录。同一子项出现多次时删除位置最小的一条
    pub async fn remove<C: ConnectionTrait>(&self, db: &C, parent_id: &str, child_id: &str) -> AppResult<Placement> {
        self.lock_parent(db, parent_id).await?;

        let siblings = self.list(db, parent_id).await?;
        let removed = siblings
            .iter()
            .find(|p| p.child_id == child_id)
            .cloned()
            .ok_or_else(|| {
                AppError::not_found_error(
                    E::CHILD_RESOURCE,
                    format!("{} {} 不在 {} {} 中", E::CHILD_RESOURCE, child_id, E::PARENT_RESOURCE, parent_id),
                )
            })?;

        E::delete_many()
            .filter(E::id_column().eq(removed.id.as_str()))
            .exec(db)
            .await
            .map_err(|e| AppError::from_db(format!("删除{}挂载记录失败", E::CHILD_RESOURCE), e))?;

        // 升序逐条前移：每一步都移入刚刚空出的位置，不会与兄弟冲突
        for sibling in siblings.iter().filter(|p| p.position > removed.position) {
            self.write_position(db, &sibling.id, sibling.position - 1).await?;
        }

        log_ordering_event!(
            "{} {} 从 {} {} 的位置 {} 移除，{} 个兄弟前移",
            E::CHILD_RESOURCE,
            child_id,
            E::PARENT_RESOURCE,
            parent_id,
            removed.position,
            siblings.iter().filter(|p| p.position > removed.position).count()
        );
        Ok(removed)
    }

    /// 按给定的 子项 → 新位置 映射重排
    ///
    /// 映射可以覆盖部分兄弟，但新位置集合必须恰好等于这些兄弟的当前位置集合，
    /// 覆盖全部兄弟时即为 {1..N} 上的双射。校验在任何写入之前完成
    pub async fn reorder<C: ConnectionTrait>(
        &self,
        db: &C,
        parent_id: &str,
        desired_positions: &HashMap<String, i32>,
    ) -> AppResult<Vec<Placement>> {
        self.lock_parent(db, parent_id).await?;
        let siblings = self.list(db, parent_id).await?;

        let moves = plan_reorder(&siblings, desired_positions)?;
        if moves.is_empty() {
            return Ok(siblings);
        }

        // 阶段一：移到不与任何最终位置冲突的临时空间
        let temporary_base = self.temporary_position_offset + siblings.len() as i32;
        for (index, (placement_id, _)) in moves.iter().enumerate() {
            self.write_position(db, placement_id, temporary_base + index as i32 + 1).await?;
        }

        // 阶段二：写入最终位置
        for (placement_id, position) in &moves {
            self.write_position(db, placement_id, *position).await?;
        }

        log_user_operation!("{} {} 重排完成，移动 {} 个{}", E::PARENT_RESOURCE, parent_id, moves.len(), E::CHILD_RESOURCE);
        self.list(db, parent_id).await
    }

    /// 检查父项下的位置是否恰好为 {1..N}
    pub async fn verify_contiguity<C: ConnectionTrait>(&self, db: &C, parent_id: &str) -> AppResult<ContiguityReport> {
        let siblings = self.list(db, parent_id).await?;
        Ok(ContiguityReport::from_positions(
            parent_id,
            siblings.iter().map(|p| p.position).collect(),
        ))
    }

    /// 锁住并加载父项
    async fn lock_parent<C: ConnectionTrait>(
        &self,
        db: &C,
        parent_id: &str,
    ) -> AppResult<<E::Parent as EntityTrait>::Model> {
        acquire_sqlite_write_lock::<E::Parent, C>(db, E::parent_key(), E::parent_lock_column(), parent_id).await?;

        let mut query = E::Parent::find().filter(E::parent_key().eq(parent_id));
        if db.get_database_backend() != DbBackend::Sqlite {
            query = query.lock_exclusive();
        }
        query
            .one(db)
            .await
            .map_err(|e| AppError::from_db(format!("加载{}失败", E::PARENT_RESOURCE), e))?
            .ok_or_else(|| {
                AppError::not_found_error(E::PARENT_RESOURCE, format!("未找到ID为 {} 的{}", parent_id, E::PARENT_RESOURCE))
            })
    }

    async fn write_position<C: ConnectionTrait>(&self, db: &C, placement_id: &str, position: i32) -> AppResult<()> {
        E::update_many()
            .col_expr(E::position_column(), Expr::value(position))
            .filter(E::id_column().eq(placement_id))
            .exec(db)
            .await
            .map_err(|e| AppError::from_db(format!("更新{}位置失败", E::CHILD_RESOURCE), e))?;
        Ok(())
    }
}

/// 在 SQLite 上为当前事务提前取得写锁
///
/// 对目标行执行 `SET col = col`，数据不变但事务立即持有写锁。
/// 必须是事务中的第一条语句；其他后端直接返回
pub(crate) async fn acquire_sqlite_write_lock<P, C>(
    db: &C,
    key_column: P::Column,
    lock_column: P::Column,
    id: &str,
) -> AppResult<()>
where
    P: EntityTrait,
    C: ConnectionTrait,
{
    if db.get_database_backend() != DbBackend::Sqlite {
        return Ok(());
    }
    P::update_many()
        .col_expr(lock_column, Expr::col(lock_column).into())
        .filter(key_column.eq(id))
        .exec(db)
        .await
        .map_err(|e| AppError::from_db("获取写锁失败", e))?;
    Ok(())
}

/// 校验重排请求并计算需要移动的挂载记录 (挂载记录ID, 新位置)
///
/// 位置未变化的子项不参与移动
pub fn plan_reorder(
    siblings: &[Placement],
    desired_positions: &HashMap<String, i32>,
) -> AppResult<Vec<(String, i32)>> {
    let sibling_count = siblings.len() as i32;

    let mut by_child: HashMap<&str, &Placement> = HashMap::new();
    let mut ambiguous: HashSet<&str> = HashSet::new();
    for placement in siblings {
        if by_child.insert(placement.child_id.as_str(), placement).is_some() {
            ambiguous.insert(placement.child_id.as_str());
        }
    }

    let mut current_positions = Vec::with_capacity(desired_positions.len());
    let mut new_positions = Vec::with_capacity(desired_positions.len());
    let mut moves = Vec::new();

    // 按子项ID排序，保证临时位置分配与日志输出稳定
    let mut requested: Vec<(&String, &i32)> = desired_positions.iter().collect();
    requested.sort();

    for (child_id, position) in requested {
        if ambiguous.contains(child_id.as_str()) {
            return Err(AppError::validation_error(format!("子项 {} 在父项中出现多次，无法按子项重排", child_id)));
        }
        let placement = by_child
            .get(child_id.as_str())
            .ok_or_else(|| AppError::validation_error(format!("子项 {} 不属于该父项", child_id)))?;
        if *position < 1 || *position > sibling_count {
            return Err(AppError::validation_error(format!(
                "子项 {} 的目标位置 {} 超出范围 1..={}",
                child_id, position, sibling_count
            )));
        }

        current_positions.push(placement.position);
        new_positions.push(*position);
        if placement.position != *position {
            moves.push((placement.id.clone(), *position));
        }
    }

    let unique_targets: HashSet<i32> = new_positions.iter().copied().collect();
    if unique_targets.len() != new_positions.len() {
        return Err(AppError::validation_error("目标位置存在重复"));
    }

    current_positions.sort_unstable();
    new_positions.sort_unstable();
    if current_positions != new_positions {
        return Err(AppError::validation_error(format!(
            "目标位置 {:?} 不是所涉子项当前位置 {:?} 的排列",
            new_positions, current_positions
        )));
    }

    Ok(moves)
}

// ==================== 三种挂载表的列映射 ====================

impl OrderedPlacement for codeplug_zone::Entity {
    type Placement = codeplug_zone::ActiveModel;
    type Parent = codeplug::Entity;
    type Child = zone::Entity;

    const PARENT_RESOURCE: &'static str = "Codeplug";
    const CHILD_RESOURCE: &'static str = "Zone";

    fn id_column() -> Self::Column {
        codeplug_zone::Column::Id
    }
    fn parent_column() -> Self::Column {
        codeplug_zone::Column::CodeplugId
    }
    fn child_column() -> Self::Column {
        codeplug_zone::Column::ZoneId
    }
    fn position_column() -> Self::Column {
        codeplug_zone::Column::Position
    }
    fn parent_key() -> codeplug::Column {
        codeplug::Column::Id
    }
    fn parent_lock_column() -> codeplug::Column {
        codeplug::Column::Name
    }
    fn child_key() -> zone::Column {
        zone::Column::Id
    }

    fn to_placement(model: &codeplug_zone::Model) -> Placement {
        Placement {
            id: model.id.clone(),
            parent_id: model.codeplug_id.clone(),
            child_id: model.zone_id.clone(),
            position: model.position,
        }
    }

    fn new_placement(parent: &codeplug::Model, child_id: &str, position: i32) -> codeplug_zone::ActiveModel {
        codeplug_zone::ActiveModel {
            id: Set(default_id()),
            codeplug_id: Set(parent.id.clone()),
            zone_id: Set(child_id.to_string()),
            position: Set(position),
        }
    }
}

impl OrderedPlacement for zone_system::Entity {
    type Placement = zone_system::ActiveModel;
    type Parent = zone::Entity;
    type Child = system::Entity;

    const PARENT_RESOURCE: &'static str = "Zone";
    const CHILD_RESOURCE: &'static str = "System";

    fn id_column() -> Self::Column {
        zone_system::Column::Id
    }
    fn parent_column() -> Self::Column {
        zone_system::Column::ZoneId
    }
    fn child_column() -> Self::Column {
        zone_system::Column::SystemId
    }
    fn position_column() -> Self::Column {
        zone_system::Column::Position
    }
    fn parent_key() -> zone::Column {
        zone::Column::Id
    }
    fn parent_lock_column() -> zone::Column {
        zone::Column::Name
    }
    fn child_key() -> system::Column {
        system::Column::Id
    }

    fn to_placement(model: &zone_system::Model) -> Placement {
        Placement {
            id: model.id.clone(),
            parent_id: model.zone_id.clone(),
            child_id: model.system_id.clone(),
            position: model.position,
        }
    }

    fn new_placement(parent: &zone::Model, child_id: &str, position: i32) -> zone_system::ActiveModel {
        zone_system::ActiveModel {
            id: Set(default_id()),
            zone_id: Set(parent.id.clone()),
            system_id: Set(child_id.to_string()),
            position: Set(position),
        }
    }
}

impl OrderedPlacement for zone_channel::Entity {
    type Placement = zone_channel::ActiveModel;
    type Parent = codeplug_zone::Entity;
    type Child = channel::Entity;

    const PARENT_RESOURCE: &'static str = "CodeplugZone";
    const CHILD_RESOURCE: &'static str = "Channel";

    fn id_column() -> Self::Column {
        zone_channel::Column::Id
    }
    fn parent_column() -> Self::Column {
        zone_channel::Column::CodeplugZoneId
    }
    fn child_column() -> Self::Column {
        zone_channel::Column::ChannelId
    }
    fn position_column() -> Self::Column {
        zone_channel::Column::Position
    }
    fn parent_key() -> codeplug_zone::Column {
        codeplug_zone::Column::Id
    }
    fn parent_lock_column() -> codeplug_zone::Column {
        codeplug_zone::Column::Position
    }
    fn child_key() -> channel::Column {
        channel::Column::Id
    }

    fn to_placement(model: &zone_channel::Model) -> Placement {
        Placement {
            id: model.id.clone(),
            parent_id: model.codeplug_zone_id.clone(),
            child_id: model.channel_id.clone(),
            position: model.position,
        }
    }

    fn new_placement(parent: &codeplug_zone::Model, child_id: &str, position: i32) -> zone_channel::ActiveModel {
        zone_channel::ActiveModel {
            id: Set(default_id()),
            codeplug_zone_id: Set(parent.id.clone()),
            codeplug_id: Set(parent.codeplug_id.clone()),
            zone_id: Set(parent.zone_id.clone()),
            channel_id: Set(child_id.to_string()),
            position: Set(position),
        }
    }

    /// 信道只能挂到所属码本的分区里
    fn check_child(parent: &codeplug_zone::Model, child: &channel::Model) -> AppResult<()> {
        if parent.codeplug_id != child.codeplug_id {
            return Err(AppError::validation_error(format!(
                "信道 {} 属于码本 {}，不能挂载到码本 {} 的分区",
                child.id, child.codeplug_id, parent.codeplug_id
            )));
        }
        Ok(())
    }
}
