mod helpers;
mod iterator_tests;
mod writer_tests;
