use async_trait::async_trait;
use uuid::Uuid;

/// CRUD over records that belong to exactly one user.
///
/// Every operation takes the owner id and filters on it inside the same
/// statement, so a record owned by someone else behaves as if it did not
/// exist. Implementations must not split lookups and writes into separate
/// round trips.
#[async_trait]
pub trait OwnedStore: Send + Sync {
    type Record: Send;
    type Draft: Send;
    type Patch: Send;

    async fn insert(&self, owner: Uuid, draft: Self::Draft) -> anyhow::Result<Self::Record>;

    /// Newest first.
    async fn list(&self, owner: Uuid) -> anyhow::Result<Vec<Self::Record>>;

    async fn find(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Self::Record>>;

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: Self::Patch,
    ) -> anyhow::Result<Option<Self::Record>>;

    /// Returns the removed record.
    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Self::Record>>;
}
