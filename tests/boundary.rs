/*!
 * Process boundary tests entry point
 */

#[path = "boundary_process/process_test.rs"]
mod process_test;
