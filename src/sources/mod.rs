pub mod retsinformation;
