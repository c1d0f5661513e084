mod helpers;

mod watching;
