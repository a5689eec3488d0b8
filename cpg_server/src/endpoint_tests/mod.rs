mod callbacks;
mod helpers;
mod mocks;
mod payments;
