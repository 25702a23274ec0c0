/// An in-process receiver-mock stand-in to be used in integration tests.
pub mod receiver_mock;
