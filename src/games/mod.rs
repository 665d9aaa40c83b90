pub mod bulls_cows;
