//! End-to-end scenarios for the remat optimizer live in `tests/`.
