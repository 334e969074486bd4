/// The result of an idempotent order insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOrderResult {
    Inserted(i64),
    AlreadyExists(i64),
}

/// The result of an idempotent payment-record insert. A payment is a duplicate when the same order already has a
/// recorded notification with the same transaction id and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPaymentResult {
    Inserted(i64),
    AlreadyExists(i64),
}
