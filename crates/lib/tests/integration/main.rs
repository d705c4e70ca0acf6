mod common;
mod driver_tests;
mod package_tests;
