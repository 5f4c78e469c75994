use rand::Rng;
use uuid::Uuid;

use crate::TrainId;

const TRAIN_ID_PREFIX: &str = "train_";

/// Mints the id of a spawned train from the session RNG, so a seeded session
/// always produces the same ids. The name is not part of the id: names are
/// recycled after departure, ids never are.
pub fn new_train_id(rng: &mut impl Rng) -> TrainId {
    let bytes: [u8; 16] = rng.gen();
    let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
    TrainId(format!("{TRAIN_ID_PREFIX}{uuid}"))
}

/// The UUID part of an id minted by [`new_train_id`]. `None` for ids from
/// elsewhere, such as test fixtures that derive ids from train names.
pub fn train_uuid(id: &TrainId) -> Option<Uuid> {
    id.0.strip_prefix(TRAIN_ID_PREFIX)
        .and_then(|rest| Uuid::parse_str(rest).ok())
}
