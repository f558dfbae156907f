mod helpers;
mod orders;
mod payments;
mod refunds;
mod wallets;
