pub mod beam;
