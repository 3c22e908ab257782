// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profiles with the authoritative point counter)
//! - Stations (check-in points)
//! - Scans (award records, one per (user, station) pair)
//!
//! The award and revoke paths are the only writers of `total_points`, and
//! both run as Firestore transactions so the counter and the scan ledger
//! move together.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Scan, Station, User};
use futures_util::FutureExt;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Outcome of an atomic award attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardOutcome {
    /// The scan was recorded; carries (points awarded, new total).
    Awarded { points: u32, total_points: u32 },
    /// A scan for this (user, station) pair already existed.
    Duplicate,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing
        // a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by uid.
    pub async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user profile.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.uid)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List all users, ordered by points descending (roster / leaderboard).
    pub async fn list_users(&self, limit: u32) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .order_by([(
                "total_points",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Station Operations ──────────────────────────────────────

    /// Get a station by ID.
    pub async fn get_station(&self, station_id: &str) -> Result<Option<Station>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::STATIONS)
            .obj()
            .one(station_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a station.
    pub async fn upsert_station(&self, station: &Station) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::STATIONS)
            .document_id(&station.id)
            .object(station)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a station document.
    ///
    /// Callers are expected to prefer deactivation when scans reference the
    /// station; existing scans keep their point snapshots either way.
    pub async fn delete_station(&self, station_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::STATIONS)
            .document_id(station_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List all stations, newest first.
    pub async fn list_stations(&self) -> Result<Vec<Station>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::STATIONS)
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Scan Operations ─────────────────────────────────────────

    /// Get the scan record for a (user, station) pair, if any.
    pub async fn get_scan(
        &self,
        user_id: &str,
        station_id: &str,
    ) -> Result<Option<Scan>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SCANS)
            .obj()
            .one(&Scan::doc_id(user_id, station_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all scans for a user, most recent first.
    pub async fn get_scans_for_user(&self, user_id: &str) -> Result<Vec<Scan>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::SCANS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .order_by([(
                "scanned_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all scans for a station, most recent first.
    pub async fn get_scans_for_station(&self, station_id: &str) -> Result<Vec<Scan>, AppError> {
        let station_id = station_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::SCANS)
            .filter(move |q| q.field("station_id").eq(station_id.clone()))
            .order_by([(
                "scanned_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Atomic Award / Revoke ───────────────────────────────────

    /// Atomically award a station's points to a user.
    ///
    /// Runs under [`firestore::FirestoreDb::run_transaction`], which hands
    /// the closure a client bound to the transaction's consistency selector.
    /// Both reads below therefore register their documents for conflict
    /// detection: if another request commits a conflicting write first, our
    /// commit aborts and the closure re-runs against fresh data, where the
    /// re-read observes the committed scan. The duplicate check performed by
    /// callers before entering here is only a fast pre-flight; the re-read
    /// inside the transaction is authoritative.
    ///
    /// Returns [`AwardOutcome::Duplicate`] if a scan for the pair already
    /// exists, and `UserNotFound` if the user document vanished (for example
    /// a concurrent account deletion).
    pub async fn award_scan_atomic(
        &self,
        user_id: &str,
        station: &Station,
    ) -> Result<AwardOutcome, AppError> {
        let doc_id = Scan::doc_id(user_id, &station.id);
        let user_id = user_id.to_string();
        let station = station.clone();

        let outcome = self
            .get_client()?
            .run_transaction(|db, tx| {
                let doc_id = doc_id.clone();
                let user_id = user_id.clone();
                let station = station.clone();
                async move {
                    // 1. Re-check the duplicate with a transaction-bound read.
                    let existing: Option<Scan> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::SCANS)
                        .obj()
                        .one(&doc_id)
                        .await?;

                    if existing.is_some() {
                        tracing::debug!(
                            user_id = %user_id,
                            station_id = %station.id,
                            "Scan already recorded (idempotent skip)"
                        );
                        return Ok(Ok(AwardOutcome::Duplicate));
                    }

                    // 2. Read the user inside the same transaction; the account
                    //    may have been deleted while the scan was in flight.
                    let user: Option<User> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::USERS)
                        .obj()
                        .one(&user_id)
                        .await?;

                    let Some(mut user) = user else {
                        tracing::warn!(
                            user_id = %user_id,
                            station_id = %station.id,
                            "User not found at award time"
                        );
                        return Ok(Err(AppError::UserNotFound));
                    };

                    // 3. Increment the counter and stage both writes.
                    user.total_points += station.points;
                    let new_total = user.total_points;

                    let scan = Scan {
                        user_id: user_id.clone(),
                        station_id: station.id.clone(),
                        points_earned: station.points,
                        scanned_at: chrono::Utc::now().to_rfc3339(),
                    };

                    db.fluent()
                        .update()
                        .in_col(collections::USERS)
                        .document_id(&user_id)
                        .object(&user)
                        .add_to_transaction(tx)?;

                    db.fluent()
                        .update()
                        .in_col(collections::SCANS)
                        .document_id(&doc_id)
                        .object(&scan)
                        .add_to_transaction(tx)?;

                    Ok(Ok(AwardOutcome::Awarded {
                        points: station.points,
                        total_points: new_total,
                    }))
                }
                .boxed()
            })
            .await
            .map_err(|e| AppError::Database(format!("Award transaction failed: {}", e)))??;

        if let AwardOutcome::Awarded {
            points,
            total_points,
        } = outcome
        {
            tracing::info!(
                user_id = %user_id,
                station_id = %station.id,
                points,
                total_points,
                "Points awarded"
            );
        }

        Ok(outcome)
    }

    /// Atomically revoke a user's scan of a station (admin reversal).
    ///
    /// Deletes the scan and decrements `total_points` by the scan's recorded
    /// `points_earned` (not the station's current value), floored at zero,
    /// inside one transaction. Reads are transaction-bound the same way as in
    /// [`Self::award_scan_atomic`], so a revoke racing an award serializes
    /// instead of losing the counter update. Returns the points removed, or
    /// `None` if no scan existed for the pair.
    pub async fn revoke_scan_atomic(
        &self,
        user_id: &str,
        station_id: &str,
    ) -> Result<Option<u32>, AppError> {
        let doc_id = Scan::doc_id(user_id, station_id);
        let user_id = user_id.to_string();

        let revoked = self
            .get_client()?
            .run_transaction(|db, tx| {
                let doc_id = doc_id.clone();
                let user_id = user_id.clone();
                async move {
                    let existing: Option<Scan> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::SCANS)
                        .obj()
                        .one(&doc_id)
                        .await?;

                    let Some(scan) = existing else {
                        return Ok(Ok(None));
                    };

                    let user: Option<User> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::USERS)
                        .obj()
                        .one(&user_id)
                        .await?;

                    let Some(mut user) = user else {
                        return Ok(Err(AppError::UserNotFound));
                    };

                    user.total_points = user.total_points.saturating_sub(scan.points_earned);

                    db.fluent()
                        .update()
                        .in_col(collections::USERS)
                        .document_id(&user_id)
                        .object(&user)
                        .add_to_transaction(tx)?;

                    db.fluent()
                        .delete()
                        .from(collections::SCANS)
                        .document_id(&doc_id)
                        .add_to_transaction(tx)?;

                    Ok(Ok(Some((scan.points_earned, user.total_points))))
                }
                .boxed()
            })
            .await
            .map_err(|e| AppError::Database(format!("Revoke transaction failed: {}", e)))??;

        Ok(revoked.map(|(points, total_points)| {
            tracing::info!(
                user_id = %user_id,
                station_id,
                points,
                total_points,
                "Scan revoked"
            );
            points
        }))
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    // ─── Administrative Progress Reset ─────────────────────────────

    /// Reset a user's progress: delete all their scans and zero the counter.
    ///
    /// The scans are removed first in batched transactions, then the counter
    /// is recomputed from whatever remains in the ledger inside one
    /// transaction rather than blindly set to zero. The remaining-scans query
    /// and the counter write share a transaction, so an award committing
    /// mid-recompute aborts one side and the loser re-runs: a scan that raced
    /// in after the deletion pass keeps its points, and the counter never
    /// drifts from the ledger sum.
    pub async fn reset_user_progress(&self, user_id: &str) -> Result<usize, AppError> {
        let scans = self.get_scans_for_user(user_id).await?;
        let count = scans.len();

        self.batch_delete(&scans, collections::SCANS, |scan: &Scan| {
            Scan::doc_id(&scan.user_id, &scan.station_id)
        })
        .await?;

        let user_id_owned = user_id.to_string();
        self.get_client()?
            .run_transaction(|db, tx| {
                let user_id = user_id_owned.clone();
                async move {
                    let filter_uid = user_id.clone();
                    let remaining: Vec<Scan> = db
                        .fluent()
                        .select()
                        .from(collections::SCANS)
                        .filter(move |q| q.field("user_id").eq(filter_uid.clone()))
                        .obj()
                        .query()
                        .await?;
                    let total: u32 = remaining.iter().map(|s| s.points_earned).sum();

                    let user: Option<User> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::USERS)
                        .obj()
                        .one(&user_id)
                        .await?;

                    if let Some(mut user) = user {
                        user.total_points = total;
                        db.fluent()
                            .update()
                            .in_col(collections::USERS)
                            .document_id(&user_id)
                            .object(&user)
                            .add_to_transaction(tx)?;
                    }

                    Ok(())
                }
                .boxed()
            })
            .await
            .map_err(|e| AppError::Database(format!("Reset recompute failed: {}", e)))?;

        tracing::info!(user_id, scans_deleted = count, "User progress reset");

        Ok(count)
    }

    // ─── User Data Deletion ────────────────────────────────────────

    /// Delete ALL data for a user.
    ///
    /// Deletes from all collections:
    /// - `scans` (query by user_id, batched)
    /// - `users/{uid}`
    ///
    /// Identity-provider account deletion stays with the caller.
    ///
    /// Returns the number of documents deleted.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        // 1. Delete all scan records
        let scans = self.get_scans_for_user(user_id).await?;
        let count = scans.len();

        self.batch_delete(&scans, collections::SCANS, |scan: &Scan| {
            Scan::doc_id(&scan.user_id, &scan.station_id)
        })
        .await?;

        deleted_count += count;
        tracing::debug!(user_id, count, "Deleted scan records");

        // 2. Delete user profile
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(user_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        deleted_count += 1;
        tracing::debug!(user_id, "Deleted user profile");

        tracing::info!(user_id, deleted_count, "User data deletion complete");

        Ok(deleted_count)
    }
}
