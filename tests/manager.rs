/*!
 * Module manager tests entry point
 */

#[path = "common/mod.rs"]
mod common;

#[path = "manager/discovery_test.rs"]
mod discovery_test;

#[path = "manager/proxy_test.rs"]
mod proxy_test;

#[path = "manager/catalog_test.rs"]
mod catalog_test;
