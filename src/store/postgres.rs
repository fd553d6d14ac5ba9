use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::str::FromStr;
use uuid::Uuid;

use super::{Store, StoreTx};
use crate::database::models::{
    BagLift, BagLiftStatus, Journey, JourneyOp, KycStatus, KycSubmission, LedgerEntry, Mason,
    NewJourneyOp, RedemptionStatus, Reward, RewardRedemption, UnknownVariant,
};
use crate::database::{DatabaseError, DatabaseManager};

const MASON_COLUMNS: &str = "id, name, phone, dealer_id, referred_by, points_balance, bags_lifted, \
     kyc_status, created_at, updated_at";

const LEDGER_COLUMNS: &str = "id, mason_id, source_type, source_id, points, memo, created_at";

const REWARD_COLUMNS: &str = "id, name, stock, point_cost, is_active, created_at, updated_at";

const BAG_LIFT_COLUMNS: &str = "id, mason_id, dealer_id, bag_count, points_credited, status, lifted_at, \
     site_id, site_key_person_name, site_key_person_phone, verification_site_image_url, \
     verification_proof_image_url, memo, approved_by, approved_at, created_at, updated_at";

const REDEMPTION_COLUMNS: &str = "id, mason_id, reward_id, quantity, points_debited, status, \
     fulfillment_notes, created_at, updated_at";

const KYC_COLUMNS: &str = "id, mason_id, status, remark, documents, created_at, updated_at";

const OP_COLUMNS: &str = "server_seq, op_id, journey_id, user_id, op_type, payload, local_seq, \
     created_at, received_at";

const JOURNEY_COLUMNS: &str = "id, user_id, status, start_time, end_time, total_distance, site_id, \
     dealer_id, destination_address, destination_latitude, destination_longitude, last_server_seq";

/// Postgres-backed store. Every `StoreTx` wraps one sqlx transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx, lock: " FOR UPDATE" }))
    }

    async fn read(&self) -> Result<Box<dyn StoreTx>, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx, lock: "" }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
    lock: &'static str,
}

fn parse<T>(row: &PgRow, column: &str) -> Result<T, DatabaseError>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: UnknownVariant| DatabaseError::Corrupt(e.to_string()))
}

fn mason_from_row(row: &PgRow) -> Result<Mason, DatabaseError> {
    Ok(Mason {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        dealer_id: row.try_get("dealer_id")?,
        referred_by: row.try_get("referred_by")?,
        points_balance: row.try_get("points_balance")?,
        bags_lifted: row.try_get("bags_lifted")?,
        kyc_status: parse(row, "kyc_status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn ledger_from_row(row: &PgRow) -> Result<LedgerEntry, DatabaseError> {
    Ok(LedgerEntry {
        id: row.try_get("id")?,
        mason_id: row.try_get("mason_id")?,
        source_type: parse(row, "source_type")?,
        source_id: row.try_get("source_id")?,
        points: row.try_get("points")?,
        memo: row.try_get("memo")?,
        created_at: row.try_get("created_at")?,
    })
}

fn reward_from_row(row: &PgRow) -> Result<Reward, DatabaseError> {
    Ok(Reward {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        stock: row.try_get("stock")?,
        point_cost: row.try_get("point_cost")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn bag_lift_from_row(row: &PgRow) -> Result<BagLift, DatabaseError> {
    Ok(BagLift {
        id: row.try_get("id")?,
        mason_id: row.try_get("mason_id")?,
        dealer_id: row.try_get("dealer_id")?,
        bag_count: row.try_get("bag_count")?,
        points_credited: row.try_get("points_credited")?,
        status: parse(row, "status")?,
        lifted_at: row.try_get("lifted_at")?,
        site_id: row.try_get("site_id")?,
        site_key_person_name: row.try_get("site_key_person_name")?,
        site_key_person_phone: row.try_get("site_key_person_phone")?,
        verification_site_image_url: row.try_get("verification_site_image_url")?,
        verification_proof_image_url: row.try_get("verification_proof_image_url")?,
        memo: row.try_get("memo")?,
        approved_by: row.try_get("approved_by")?,
        approved_at: row.try_get("approved_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn redemption_from_row(row: &PgRow) -> Result<RewardRedemption, DatabaseError> {
    Ok(RewardRedemption {
        id: row.try_get("id")?,
        mason_id: row.try_get("mason_id")?,
        reward_id: row.try_get("reward_id")?,
        quantity: row.try_get("quantity")?,
        points_debited: row.try_get("points_debited")?,
        status: parse(row, "status")?,
        fulfillment_notes: row.try_get("fulfillment_notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn kyc_from_row(row: &PgRow) -> Result<KycSubmission, DatabaseError> {
    Ok(KycSubmission {
        id: row.try_get("id")?,
        mason_id: row.try_get("mason_id")?,
        status: parse(row, "status")?,
        remark: row.try_get("remark")?,
        documents: row.try_get("documents")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn op_from_row(row: &PgRow) -> Result<JourneyOp, DatabaseError> {
    Ok(JourneyOp {
        server_seq: row.try_get("server_seq")?,
        op_id: row.try_get("op_id")?,
        journey_id: row.try_get("journey_id")?,
        user_id: row.try_get("user_id")?,
        op_type: parse(row, "op_type")?,
        payload: row.try_get("payload")?,
        local_seq: row.try_get("local_seq")?,
        created_at: row.try_get("created_at")?,
        received_at: row.try_get("received_at")?,
    })
}

fn journey_from_row(row: &PgRow) -> Result<Journey, DatabaseError> {
    Ok(Journey {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        status: parse(row, "status")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        total_distance: row.try_get("total_distance")?,
        site_id: row.try_get("site_id")?,
        dealer_id: row.try_get("dealer_id")?,
        destination_address: row.try_get("destination_address")?,
        destination_latitude: row.try_get("destination_latitude")?,
        destination_longitude: row.try_get("destination_longitude")?,
        last_server_seq: row.try_get("last_server_seq")?,
    })
}

#[async_trait]
impl StoreTx for PgTx {
    async fn insert_mason(&mut self, mason: &Mason) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO masons ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            MASON_COLUMNS
        ))
        .bind(mason.id)
        .bind(&mason.name)
        .bind(&mason.phone)
        .bind(mason.dealer_id)
        .bind(mason.referred_by)
        .bind(mason.points_balance)
        .bind(mason.bags_lifted)
        .bind(mason.kyc_status.as_str())
        .bind(mason.created_at)
        .bind(mason.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn mason(&mut self, id: Uuid) -> Result<Option<Mason>, DatabaseError> {
        let sql = format!("SELECT {} FROM masons WHERE id = $1{}", MASON_COLUMNS, self.lock);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(mason_from_row).transpose()
    }

    async fn mason_ids(&mut self) -> Result<Vec<Uuid>, DatabaseError> {
        let rows = sqlx::query("SELECT id FROM masons ORDER BY created_at")
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("id").map_err(DatabaseError::from))
            .collect()
    }

    async fn adjust_mason_totals(&mut self, id: Uuid, points_delta: i64, bags_delta: i64) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE masons SET points_balance = points_balance + $2, bags_lifted = bags_lifted + $3, \
             updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(points_delta)
        .bind(bags_delta)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_mason_totals(&mut self, id: Uuid, points_balance: i64, bags_lifted: i64) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE masons SET points_balance = $2, bags_lifted = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(points_balance)
        .bind(bags_lifted)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_mason_kyc_status(&mut self, id: Uuid, status: KycStatus) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE masons SET kyc_status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_mason_profile(&mut self, id: Uuid, name: Option<&str>, dealer_id: Option<Uuid>) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE masons SET name = COALESCE($2, name), dealer_id = COALESCE($3, dealer_id), \
             updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(name)
        .bind(dealer_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO points_ledger ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            LEDGER_COLUMNS
        ))
        .bind(entry.id)
        .bind(entry.mason_id)
        .bind(entry.source_type.as_str())
        .bind(entry.source_id)
        .bind(entry.points)
        .bind(&entry.memo)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn ledger_entries(&mut self, mason_id: Uuid) -> Result<Vec<LedgerEntry>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM points_ledger WHERE mason_id = $1 ORDER BY created_at, id",
            LEDGER_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(mason_id).fetch_all(&mut *self.tx).await?;
        rows.iter().map(ledger_from_row).collect()
    }

    async fn ledger_total(&mut self, mason_id: Uuid) -> Result<i64, DatabaseError> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(points), 0)::BIGINT FROM points_ledger WHERE mason_id = $1",
        )
        .bind(mason_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(total.0)
    }

    async fn approved_bag_total(&mut self, mason_id: Uuid) -> Result<i64, DatabaseError> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(bag_count), 0)::BIGINT FROM bag_lifts \
             WHERE mason_id = $1 AND status = 'approved'",
        )
        .bind(mason_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(total.0)
    }

    async fn insert_reward(&mut self, reward: &Reward) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO rewards ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            REWARD_COLUMNS
        ))
        .bind(reward.id)
        .bind(&reward.name)
        .bind(reward.stock)
        .bind(reward.point_cost)
        .bind(reward.is_active)
        .bind(reward.created_at)
        .bind(reward.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn reward(&mut self, id: Uuid) -> Result<Option<Reward>, DatabaseError> {
        let sql = format!("SELECT {} FROM rewards WHERE id = $1{}", REWARD_COLUMNS, self.lock);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(reward_from_row).transpose()
    }

    async fn adjust_stock(&mut self, id: Uuid, delta: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE rewards SET stock = stock + $2, updated_at = now() \
             WHERE id = $1 AND stock + $2 >= 0",
        )
        .bind(id)
        .bind(delta)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_bag_lift(&mut self, lift: &BagLift) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO bag_lifts ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
            BAG_LIFT_COLUMNS
        ))
        .bind(lift.id)
        .bind(lift.mason_id)
        .bind(lift.dealer_id)
        .bind(lift.bag_count)
        .bind(lift.points_credited)
        .bind(lift.status.as_str())
        .bind(lift.lifted_at)
        .bind(lift.site_id)
        .bind(&lift.site_key_person_name)
        .bind(&lift.site_key_person_phone)
        .bind(&lift.verification_site_image_url)
        .bind(&lift.verification_proof_image_url)
        .bind(&lift.memo)
        .bind(lift.approved_by)
        .bind(lift.approved_at)
        .bind(lift.created_at)
        .bind(lift.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn bag_lift(&mut self, id: Uuid) -> Result<Option<BagLift>, DatabaseError> {
        let sql = format!("SELECT {} FROM bag_lifts WHERE id = $1{}", BAG_LIFT_COLUMNS, self.lock);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(bag_lift_from_row).transpose()
    }

    async fn update_bag_lift(&mut self, prior: BagLiftStatus, lift: &BagLift) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE bag_lifts SET status = $3, site_id = $4, site_key_person_name = $5, \
             site_key_person_phone = $6, verification_site_image_url = $7, \
             verification_proof_image_url = $8, memo = $9, approved_by = $10, approved_at = $11, \
             updated_at = $12 WHERE id = $1 AND status = $2",
        )
        .bind(lift.id)
        .bind(prior.as_str())
        .bind(lift.status.as_str())
        .bind(lift.site_id)
        .bind(&lift.site_key_person_name)
        .bind(&lift.site_key_person_phone)
        .bind(&lift.verification_site_image_url)
        .bind(&lift.verification_proof_image_url)
        .bind(&lift.memo)
        .bind(lift.approved_by)
        .bind(lift.approved_at)
        .bind(lift.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_redemption(&mut self, redemption: &RewardRedemption) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO reward_redemptions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            REDEMPTION_COLUMNS
        ))
        .bind(redemption.id)
        .bind(redemption.mason_id)
        .bind(redemption.reward_id)
        .bind(redemption.quantity)
        .bind(redemption.points_debited)
        .bind(redemption.status.as_str())
        .bind(&redemption.fulfillment_notes)
        .bind(redemption.created_at)
        .bind(redemption.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn redemption(&mut self, id: Uuid) -> Result<Option<RewardRedemption>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM reward_redemptions WHERE id = $1{}",
            REDEMPTION_COLUMNS, self.lock
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(redemption_from_row).transpose()
    }

    async fn update_redemption(&mut self, prior: RedemptionStatus, redemption: &RewardRedemption) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE reward_redemptions SET status = $3, fulfillment_notes = $4, updated_at = $5 \
             WHERE id = $1 AND status = $2",
        )
        .bind(redemption.id)
        .bind(prior.as_str())
        .bind(redemption.status.as_str())
        .bind(&redemption.fulfillment_notes)
        .bind(redemption.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_kyc(&mut self, submission: &KycSubmission) -> Result<(), DatabaseError> {
        sqlx::query(&format!(
            "INSERT INTO kyc_submissions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            KYC_COLUMNS
        ))
        .bind(submission.id)
        .bind(submission.mason_id)
        .bind(submission.status.as_str())
        .bind(&submission.remark)
        .bind(&submission.documents)
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn kyc(&mut self, id: Uuid) -> Result<Option<KycSubmission>, DatabaseError> {
        let sql = format!("SELECT {} FROM kyc_submissions WHERE id = $1{}", KYC_COLUMNS, self.lock);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(kyc_from_row).transpose()
    }

    async fn update_kyc(&mut self, prior: KycStatus, submission: &KycSubmission) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE kyc_submissions SET status = $3, remark = $4, documents = $5, updated_at = $6 \
             WHERE id = $1 AND status = $2",
        )
        .bind(submission.id)
        .bind(prior.as_str())
        .bind(submission.status.as_str())
        .bind(&submission.remark)
        .bind(&submission.documents)
        .bind(submission.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_op(&mut self, op_id: Uuid) -> Result<Option<JourneyOp>, DatabaseError> {
        let sql = format!("SELECT {} FROM journey_ops WHERE op_id = $1", OP_COLUMNS);
        let row = sqlx::query(&sql).bind(op_id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(op_from_row).transpose()
    }

    async fn insert_op(&mut self, op: &NewJourneyOp) -> Result<Option<JourneyOp>, DatabaseError> {
        // server_seq comes from the BIGSERIAL; a concurrent insert of the
        // same op_id makes this return no row instead of failing
        let sql = format!(
            "INSERT INTO journey_ops (op_id, journey_id, user_id, op_type, payload, local_seq, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (op_id) DO NOTHING RETURNING {}",
            OP_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(op.op_id)
            .bind(op.journey_id)
            .bind(op.user_id)
            .bind(op.op_type.as_str())
            .bind(&op.payload)
            .bind(op.local_seq)
            .bind(op.created_at)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(op_from_row).transpose()
    }

    async fn ops_after(&mut self, after: i64, user_id: Option<Uuid>, limit: i64) -> Result<Vec<JourneyOp>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM journey_ops WHERE server_seq > $1 AND ($2::UUID IS NULL OR user_id = $2) \
             ORDER BY server_seq LIMIT $3",
            OP_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(after)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(op_from_row).collect()
    }

    async fn all_ops(&mut self) -> Result<Vec<JourneyOp>, DatabaseError> {
        let sql = format!("SELECT {} FROM journey_ops ORDER BY server_seq", OP_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;
        rows.iter().map(op_from_row).collect()
    }

    async fn journey(&mut self, id: Uuid) -> Result<Option<Journey>, DatabaseError> {
        let sql = format!("SELECT {} FROM journeys WHERE id = $1{}", JOURNEY_COLUMNS, self.lock);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *self.tx).await?;
        row.as_ref().map(journey_from_row).transpose()
    }

    async fn insert_journey(&mut self, journey: &Journey) -> Result<(), DatabaseError> {
        write_journey(
            &mut self.tx,
            &format!(
                "INSERT INTO journeys ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
                JOURNEY_COLUMNS
            ),
            journey,
        )
        .await
    }

    async fn save_journey(&mut self, journey: &Journey) -> Result<(), DatabaseError> {
        write_journey(
            &mut self.tx,
            &format!(
                "INSERT INTO journeys ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
                 ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, end_time = EXCLUDED.end_time, \
                 total_distance = EXCLUDED.total_distance, last_server_seq = EXCLUDED.last_server_seq",
                JOURNEY_COLUMNS
            ),
            journey,
        )
        .await
    }

    async fn clear_journeys(&mut self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM journeys").execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }
}

async fn write_journey(
    tx: &mut Transaction<'static, Postgres>,
    sql: &str,
    journey: &Journey,
) -> Result<(), DatabaseError> {
    sqlx::query(sql)
        .bind(journey.id)
        .bind(journey.user_id)
        .bind(journey.status.as_str())
        .bind(journey.start_time)
        .bind(journey.end_time)
        .bind(journey.total_distance)
        .bind(journey.site_id)
        .bind(journey.dealer_id)
        .bind(&journey.destination_address)
        .bind(journey.destination_latitude)
        .bind(journey.destination_longitude)
        .bind(journey.last_server_seq)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
