use anyhow::{Context, Result};
use chrono::NaiveDate;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::entities::{prelude::*, records};
use game_core::{DailyRecord, RecordUpdate, ReplyVerdict, advance_record};
use game_types::RecordStatus;

pub struct RecordRepository {
    db: DatabaseConnection,
}

impl RecordRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_record(model: records::Model) -> Result<DailyRecord> {
        let status = model
            .result
            .parse::<RecordStatus>()
            .with_context(|| format!("Corrupt record {}", model.id))?;

        Ok(DailyRecord {
            id: model.id,
            user_id: model.user_id,
            attempts: model.attempts,
            status,
            date: model.date,
        })
    }

    fn models_to_records(models: Vec<records::Model>) -> Result<Vec<DailyRecord>> {
        models.into_iter().map(Self::model_to_record).collect()
    }

    pub async fn find_for_day(&self, user_id: Uuid, date: NaiveDate) -> Result<Option<DailyRecord>> {
        let model = Records::find()
            .filter(records::Column::UserId.eq(user_id))
            .filter(records::Column::Date.eq(date))
            .one(&self.db)
            .await?;

        model.map(Self::model_to_record).transpose()
    }

    /// Count one game move of `user_id` on `date` and apply the verdict of the reply it got.
    pub async fn record_move(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        verdict: ReplyVerdict,
    ) -> Result<RecordUpdate> {
        let existing = self.find_for_day(user_id, date).await?;
        let update = advance_record(existing, user_id, date, verdict);
        let record = &update.record;

        if update.created {
            let model = records::ActiveModel {
                id: sea_orm::ActiveValue::Set(record.id),
                user_id: sea_orm::ActiveValue::Set(record.user_id),
                attempts: sea_orm::ActiveValue::Set(record.attempts),
                result: sea_orm::ActiveValue::Set(record.status.as_str().to_string()),
                date: sea_orm::ActiveValue::Set(record.date),
            };
            Records::insert(model).exec(&self.db).await?;
        } else if update.changed {
            let model = records::ActiveModel {
                id: sea_orm::ActiveValue::Unchanged(record.id),
                user_id: sea_orm::ActiveValue::Unchanged(record.user_id),
                attempts: sea_orm::ActiveValue::Set(record.attempts),
                result: sea_orm::ActiveValue::Set(record.status.as_str().to_string()),
                date: sea_orm::ActiveValue::Unchanged(record.date),
            };
            Records::update(model).exec(&self.db).await?;
        }

        if let Some(status) = update.finished_as {
            tracing::info!(
                "User {} finished the game of {} as {} after {} attempts",
                user_id,
                date,
                status,
                record.attempts
            );
        }

        Ok(update)
    }

    /// All records of one user, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<DailyRecord>> {
        let models = Records::find()
            .filter(records::Column::UserId.eq(user_id))
            .order_by_desc(records::Column::Date)
            .all(&self.db)
            .await?;

        Self::models_to_records(models)
    }

    /// Every finished record of every user
    pub async fn list_finished(&self) -> Result<Vec<DailyRecord>> {
        let models = Records::find()
            .filter(records::Column::Result.is_in([
                RecordStatus::Success.as_str(),
                RecordStatus::Failure.as_str(),
            ]))
            .all(&self.db)
            .await?;

        Self::models_to_records(models)
    }
}
